/*!

This is the long-form manual for `vote_tally` and `nettally`.

## Vote lines

A post votes through the lines that start with a marker in square brackets.
Everything else in the post is ignored.

```text
[x] Go north
-[x] Carefully
[X][Action] Fight the ogre
[1] Cake
[2] Pie
```

* `x`, `X`, `✓`, `✔`, `☑` and `🗸` are standard markers. They all count the same.
* A single digit from `1` to `9` is a rank. Ranked lines are tallied
  separately from standard lines, one line at a time.
* Each `-` before the marker nests the line one level deeper. Spaces between
  the dashes are allowed.
* A second bracket right after the marker is the task of the line
  (`[x][Action] ...`). Tasks are compared without case or formatting.
* Formatting tags (`[b]`, `[i]`, `[u]`, `[s]`, `[color=...]`) may wrap the
  line. Tags opened before the marker are kept on the content and every vote
  is shown with balanced tags. A tag opened or closed inside the marker
  brackets (`[b][x[/b]]`) makes the line unreadable: it is dropped and the
  rest of the post still counts.

Two votes are the same when their normalized forms are equal: HTML entities
decoded, links replaced by their label, formatting removed, accents removed,
case folded, whitespace collapsed and trailing punctuation trimmed.

## Partition modes

The partition mode decides what a single vote is.

* `none`: the whole post is one vote.
* `line`: every line is its own vote, nesting removed.
* `block`: a top-level line and the lines nested under it form one vote.
* `blockAll`: like `block`, but plans are split into one vote per child
  block. The children inherit the task of the plan when they have none.

## References and plans

A line whose content is only a name can stand for another vote:

* `[x] Alice` is replaced by the current vote of the voter Alice.
* `[x] Plan Kitten` is replaced by the plan named Kitten.

A block whose first line is `[x] Plan <name>` and which has nested lines
defines the plan `<name>`. A plan belongs to the first voter who defines it.
Once nobody votes for the plan any more, a reference to it stays as
written.

References only see the posts read before the current one. A name that
matches nothing, or that matches several different votes, stays as written.
Voters can refer to their own previous vote.

Voter names are compared without case, and nothing else: `Zoë` and `Zoe`
are two voters. A voter only supports the votes of their latest post. A
post that contains the tally marker `#####` is a posted tally and never
counts.

## Input formats

`nettally` reads posts that a forum adapter has already exported.

### `json`

An array of posts:

```json
[
  { "author": "Alice", "id": "1234", "number": 2, "text": "[x] Go north" }
]
```

### `dump`

Plain text. Each post starts with a header line, and the text runs to the
next header:

```text
=== Alice | 1234 | 2
[x] Go north
=== Bob | 1240 | 3
[x] Alice
```

## Configuration

`nettally` accepts a quest configuration file in JSON:

```json
{
  "quest": {
    "threadName": "Dragon Quest",
    "threadUrl": "https://forums.example.com/threads/dragon-quest.123/",
    "forumType": "xenforo"
  },
  "postSources": [{ "provider": "dump", "filePath": "posts.txt" }],
  "rules": {
    "partitionMode": "block",
    "startPost": 1,
    "endPost": 0,
    "excludeThreadStarter": true,
    "threadStarter": "Quest Master",
    "tallyRanks": true,
    "sortResults": false
  }
}
```

All the `rules` are optional. `endPost` set to 0 reads to the end of the
thread. `forumType` is one of `xenforo`, `vbulletin` or `nodebb`, and is
guessed from the thread address when missing. It only decides how the links
to the posts are written.

Relative file paths are relative to the configuration file. The options on
the command line override the configuration file.

 */
