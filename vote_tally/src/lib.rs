/*!
Vote parsing and tallying for forum quest threads.

Players of a forum quest vote by writing marked lines in their posts
(`[x] Go north`). This crate reads those lines, groups equivalent votes,
resolves the votes that refer to another voter or to a named plan, and keeps
for every voter the support of their latest post only.

```
use vote_tally::builder::ThreadBuilder;
use vote_tally::format::{format_results, FormatOptions};
use vote_tally::{PartitionMode, TallyOptions, VoteCounter};

let posts = ThreadBuilder::new()
    .post("Quest Master", "The ogre blocks the bridge.")
    .post("Alice", "[x] Fight\n[x] Swim across")
    .post("Bob", "[x] fight.")
    .build();

let mut counter = VoteCounter::new();
let options = TallyOptions::DEFAULT_OPTIONS.with_partition_mode(PartitionMode::Line);
counter.tally_posts(&posts, &options);

let report = format_results(
    &counter,
    &|id| format!("https://forum.example/posts/{}/", id),
    &FormatOptions::DEFAULT_OPTIONS,
);
assert!(report.contains("[x] Fight\n[b]No. of Votes: 2[/b]"));
```

See the [manual] for the vote line grammar.
*/

mod config;
mod counter;

pub mod builder;
pub mod format;
pub mod line;
pub mod manual;
pub mod normalize;
pub mod partition;
pub mod reference;
pub mod supporters;

pub use crate::config::*;
pub use crate::counter::*;
