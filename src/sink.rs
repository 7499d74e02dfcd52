//! Append-only CSV stream of harvested posts.

use std::fs::{File, OpenOptions};
use std::path::Path;

use csv::Writer;

use crate::model::Post;
use crate::Result;

/// One `(topic, poster, text)` row per post. Appends across runs, so the
/// output file accumulates alongside the checkpoint file.
pub struct PostSink {
    writer: Writer<File>,
}

impl PostSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: csv::WriterBuilder::new().from_writer(file),
        })
    }

    pub fn write_posts(&mut self, topic: &str, posts: &[Post]) -> Result<()> {
        for post in posts {
            self.writer
                .write_record([topic, &post.poster_name, &post.text])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
