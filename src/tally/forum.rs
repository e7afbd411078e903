// Permalinks to the posts of the supported forums.

use crate::tally::*;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum ForumKind {
    XenForo,
    VBulletin,
    NodeBB,
}

impl ForumKind {
    pub fn parse(name: &str) -> TallyResult<ForumKind> {
        match name.trim().to_lowercase().as_str() {
            "xenforo" | "xenforo1" | "xenforo2" => Ok(ForumKind::XenForo),
            "vbulletin" | "vbulletin3" | "vbulletin4" | "vbulletin5" => Ok(ForumKind::VBulletin),
            "nodebb" => Ok(ForumKind::NodeBB),
            _ => InvalidOptionSnafu {
                name: "forumType",
                value: name,
            }
            .fail(),
        }
    }

    /// Guesses the forum software from the address of a thread.
    pub fn detect(thread_url: &str) -> Option<ForumKind> {
        let url = thread_url.to_lowercase();
        if url.contains("/threads/") {
            Some(ForumKind::XenForo)
        } else if url.contains("showthread.php") || url.contains("/forum/") {
            Some(ForumKind::VBulletin)
        } else if url.contains("/topic/") {
            Some(ForumKind::NodeBB)
        } else {
            None
        }
    }

    fn thread_marker(&self) -> &'static str {
        match self {
            ForumKind::XenForo => "/threads/",
            ForumKind::VBulletin => "/showthread.php",
            ForumKind::NodeBB => "/topic/",
        }
    }

    /// The permalink of a post of the thread.
    pub fn post_url(&self, thread_url: &str, post_id: &str) -> String {
        let site = match thread_url.find(self.thread_marker()) {
            Some(pos) => &thread_url[..pos],
            None => thread_url.trim_end_matches('/'),
        };
        match self {
            ForumKind::XenForo => format!("{}/posts/{}/", site, post_id),
            ForumKind::VBulletin => format!("{}/showthread.php?p={}#post{}", site, post_id, post_id),
            ForumKind::NodeBB => format!("{}/post/{}", site, post_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection() {
        assert_eq!(
            ForumKind::detect("https://forums.sufficientvelocity.com/threads/quest.123/page-4"),
            Some(ForumKind::XenForo)
        );
        assert_eq!(
            ForumKind::detect("https://forums.example.com/showthread.php?t=55"),
            Some(ForumKind::VBulletin)
        );
        assert_eq!(
            ForumKind::detect("https://community.example.org/topic/12/quest"),
            Some(ForumKind::NodeBB)
        );
        assert_eq!(ForumKind::detect("https://example.org/"), None);
    }

    #[test]
    fn names() {
        assert_eq!(ForumKind::parse("XenForo2").unwrap(), ForumKind::XenForo);
        assert!(ForumKind::parse("phpbb").is_err());
    }

    #[test]
    fn permalinks() {
        assert_eq!(
            ForumKind::XenForo.post_url("https://forums.example.com/threads/quest.123/", "987"),
            "https://forums.example.com/posts/987/"
        );
        assert_eq!(
            ForumKind::VBulletin.post_url("https://forums.example.com/showthread.php?t=55", "12"),
            "https://forums.example.com/showthread.php?p=12#post12"
        );
        assert_eq!(
            ForumKind::NodeBB.post_url("https://community.example.org/topic/12/quest", "4"),
            "https://community.example.org/post/4"
        );
        assert_eq!(
            ForumKind::XenForo.post_url("https://forums.example.com/", "1"),
            "https://forums.example.com/posts/1/"
        );
    }
}
