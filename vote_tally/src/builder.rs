use crate::config::Post;

/// A builder for thread posts.
///
/// Posts are numbered in the order they are added. The id of a post is its
/// number, which is what most forums expose in their permalinks.
///
/// ```
/// use vote_tally::builder::ThreadBuilder;
///
/// let posts = ThreadBuilder::new()
///     .post("Quest Master", "Chapter 1. What do you do?")
///     .post("Alice", "[x] Open the door")
///     .build();
///
/// assert_eq!(posts.len(), 2);
/// assert_eq!(posts[1].number, 2);
/// assert_eq!(posts[1].id, "2");
/// ```
#[derive(Debug, Clone)]
pub struct ThreadBuilder {
    next_number: u32,
    posts: Vec<Post>,
}

impl ThreadBuilder {
    pub fn new() -> ThreadBuilder {
        ThreadBuilder {
            next_number: 1,
            posts: Vec::new(),
        }
    }

    /// Sets the number of the next post, for threads read from the middle.
    pub fn starting_at(self, number: u32) -> ThreadBuilder {
        ThreadBuilder {
            next_number: number,
            ..self
        }
    }

    pub fn post(self, author: &str, text: &str) -> ThreadBuilder {
        let id = self.next_number.to_string();
        self.post_with_id(author, &id, text)
    }

    /// Adds a post with an explicit forum id.
    pub fn post_with_id(mut self, author: &str, id: &str, text: &str) -> ThreadBuilder {
        self.posts
            .push(Post::new(author, id, self.next_number, text));
        self.next_number += 1;
        self
    }

    pub fn build(self) -> Vec<Post> {
        self.posts
    }
}

impl Default for ThreadBuilder {
    fn default() -> Self {
        ThreadBuilder::new()
    }
}
