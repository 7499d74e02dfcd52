/// One trending topic from the hot-search listing. `name` is the key the
/// checkpoint store tracks pagination under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub rank: u32,
    pub count_posts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub poster_name: String,
    pub text: String,
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub url: String,
}
