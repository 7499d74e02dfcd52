//! Extracts posts from a search-result page.

use scraper::{ElementRef, Html, Node, Selector};
use tokio::task::spawn_blocking;

use crate::model::Post;
use crate::{Error, Result};

/// Parses one page of search-result HTML into the posts it lists.
/// Runs on the blocking pool since the parsed DOM is not `Send`.
pub async fn parse_posts(html: String) -> Result<Vec<Post>> {
    spawn_blocking(move || extract_posts(&html)).await?
}

fn extract_posts(html: &str) -> Result<Vec<Post>> {
    let doc = Html::parse_document(html);

    let card_selector = create_selector(r#"div.card-wrap[action-type="feed_list_item"]"#)?;
    let full_selector = create_selector(r#"p.txt[node-type="feed_list_content_full"]"#)?;
    let short_selector = create_selector(r#"p.txt[node-type="feed_list_content"]"#)?;
    let icon_selector = create_selector("i.wbicon")?;

    let mut posts = Vec::new();
    for card in doc.select(&card_selector) {
        let fragment = Html::parse_fragment(&card.html());

        // Expanded text when the post was truncated, regular text otherwise.
        let Some(content) = fragment
            .select(&full_selector)
            .next()
            .or_else(|| fragment.select(&short_selector).next())
        else {
            continue;
        };
        // Cards without a poster are ads or retweet stubs.
        let Some(poster) = content.value().attr("nick-name") else {
            continue;
        };

        posts.push(Post {
            poster_name: poster.to_owned(),
            text: content_text(content, &icon_selector),
            images: Vec::new(),
        });
    }
    Ok(posts)
}

/// Concatenates the content's text, dropping any child element that carries
/// an inline icon (topic badges, emoji placeholders).
fn content_text(content: ElementRef, icon_selector: &Selector) -> String {
    let mut text = String::new();
    for child in content.children() {
        match child.value() {
            Node::Text(t) => text.push_str(t.trim()),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    if el.select(icon_selector).next().is_none() {
                        for piece in el.text() {
                            text.push_str(piece.trim());
                        }
                    }
                }
            }
            _ => {}
        }
    }
    text
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}
