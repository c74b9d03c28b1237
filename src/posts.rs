// Posts and the oldest-first timeline built from them.

use chrono::{DateTime, NaiveDate, Utc};

use crate::protocol::PostRecord;

/// One post as the client sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub author: String,
    pub message: String,
    /// Epoch seconds as sent by the backend; also the id used to delete it.
    pub timestamp_id: String,
}

impl Post {
    /// Posting time, when the id parses as epoch seconds.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        let secs = self.timestamp_id.trim().parse::<i64>().ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

impl From<PostRecord> for Post {
    fn from(record: PostRecord) -> Self {
        Post {
            author: record.alias.s,
            message: record.message.s,
            timestamp_id: record.timestamp.s,
        }
    }
}

/// A post placed on the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelinePost {
    pub post: Post,
    /// `None` when the timestamp id is not a valid epoch.
    pub posted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    /// Marks the first post of a new calendar date.
    DateSeparator(NaiveDate),
    Post(TimelinePost),
}

/// Turn a newest-first batch into an oldest-first timeline.
///
/// A separator precedes the first post of every date that differs from the
/// date of the last dated post. Posts without a usable timestamp stay in
/// place and leave the current date alone.
pub fn build_timeline(newest_first: Vec<Post>) -> Vec<TimelineEntry> {
    let mut entries = Vec::with_capacity(newest_first.len() * 2);
    let mut current: Option<NaiveDate> = None;

    for post in newest_first.into_iter().rev() {
        let posted_at = post.posted_at();
        if let Some(date) = posted_at.map(|t| t.date_naive()) {
            if current != Some(date) {
                entries.push(TimelineEntry::DateSeparator(date));
                current = Some(date);
            }
        }
        entries.push(TimelineEntry::Post(TimelinePost { post, posted_at }));
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    // 2017-07-14 02:40:00 UTC
    const DAY_ONE: i64 = 1_500_000_000;
    const DAY: i64 = 86_400;

    fn post(author: &str, ts: i64) -> Post {
        Post {
            author: author.into(),
            message: format!("from {author}"),
            timestamp_id: ts.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn shape(entries: &[TimelineEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| match e {
                TimelineEntry::DateSeparator(d) => format!("== {d}"),
                TimelineEntry::Post(p) => p.post.author.clone(),
            })
            .collect()
    }

    #[rstest]
    fn empty_batch_gives_empty_timeline() {
        assert!(build_timeline(Vec::new()).is_empty());
    }

    #[rstest]
    fn reverses_and_separates_by_date() {
        let newest_first = vec![
            post("d", DAY_ONE + DAY + 60),
            post("c", DAY_ONE + DAY),
            post("b", DAY_ONE + 60),
            post("a", DAY_ONE),
        ];

        let timeline = build_timeline(newest_first);
        assert_eq!(
            shape(&timeline),
            vec!["== 2017-07-14", "a", "b", "== 2017-07-15", "c", "d"]
        );
        assert_eq!(timeline[0], TimelineEntry::DateSeparator(date(2017, 7, 14)));
    }

    #[rstest]
    fn separator_follows_date_value_not_position() {
        // Out-of-order input: a later date between two posts of the same day.
        let newest_first = vec![
            post("c", DAY_ONE + 120),
            post("b", DAY_ONE + DAY),
            post("a", DAY_ONE),
        ];

        assert_eq!(
            shape(&build_timeline(newest_first)),
            vec!["== 2017-07-14", "a", "== 2017-07-15", "b", "== 2017-07-14", "c"]
        );
    }

    #[rstest]
    fn undated_posts_keep_their_place() {
        let mut odd = post("x", 0);
        odd.timestamp_id = "not-a-number".into();
        let newest_first = vec![post("b", DAY_ONE + 60), odd, post("a", DAY_ONE)];

        let timeline = build_timeline(newest_first);
        assert_eq!(shape(&timeline), vec!["== 2017-07-14", "a", "x", "b"]);
        match &timeline[2] {
            TimelineEntry::Post(p) => assert_eq!(p.posted_at, None),
            other => panic!("expected post, got {other:?}"),
        }
    }

    #[rstest]
    fn record_maps_onto_post() {
        let record: PostRecord = serde_json::from_value(serde_json::json!({
            "Alias": {"S": "doug"},
            "Timestamp": {"S": "1500000000"},
            "Message": {"S": "hi"}
        }))
        .unwrap();

        let p = Post::from(record);
        assert_eq!(p.author, "doug");
        assert_eq!(p.timestamp_id, "1500000000");
        assert_eq!(p.posted_at().map(|t| t.timestamp()), Some(DAY_ONE));
    }
}
