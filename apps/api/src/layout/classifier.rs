//! Content Classifier — turns a chapter's raw text into typed content blocks.
//!
//! Each trimmed line is run through an ordered rule table; the first rule that
//! accepts the line decides its block type. The chapter-title rule only sees
//! the first non-empty line, so body text that happens to start with `제N장`
//! later in the chapter stays a paragraph.
//!
//! Classification never looks at layout state: the same text always yields the
//! same blocks.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{IMG:([^}]+)\}\}").expect("placeholder regex is valid"));

static CHAPTER_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^제.{0,8}장").expect("chapter title regex is valid"));

static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("numbered subtitle regex is valid"));

const SUBTITLE_MARKERS: [char; 7] = ['▶', '●', '◆', '★', '■', '□', '○'];

// ────────────────────────────────────────────────────────────────────────────
// Blocks
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    ChapterTitle { main: String, sub: String },
    Subtitle { text: String },
    ImagePlaceholder { tag: String },
    Paragraph { text: String },
    /// An empty source line: half a body line of vertical space.
    Blank,
}

/// How raw text is cut into paragraph units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Every source line is its own unit.
    #[default]
    Lines,
    /// Consecutive paragraph lines merge into one block joined by `\n`.
    Paragraphs,
}

impl FromStr for SplitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lines" | "line" => Ok(SplitPolicy::Lines),
            "paragraphs" | "paragraph" => Ok(SplitPolicy::Paragraphs),
            other => Err(format!("unknown text split policy '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Rule table
// ────────────────────────────────────────────────────────────────────────────

type BuildFn = Box<dyn Fn(&str) -> Option<ContentBlock> + Send + Sync>;

/// One entry of the rule table: a constructor that accepts or rejects a
/// trimmed, non-empty line.
pub struct Rule {
    pub name: &'static str,
    /// Only offered the first non-empty line of a chapter.
    pub first_line_only: bool,
    build: BuildFn,
}

impl Rule {
    pub fn new(
        name: &'static str,
        first_line_only: bool,
        build: impl Fn(&str) -> Option<ContentBlock> + Send + Sync + 'static,
    ) -> Self {
        Rule {
            name,
            first_line_only,
            build: Box::new(build),
        }
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("first_line_only", &self.first_line_only)
            .finish()
    }
}

#[derive(Debug)]
pub struct Classifier {
    rules: Vec<Rule>,
    policy: SplitPolicy,
}

impl Default for Classifier {
    fn default() -> Self {
        Classifier::new(SplitPolicy::default())
    }
}

impl Classifier {
    /// The standard table: placeholder, chapter title, subtitle. Anything the
    /// table rejects is a paragraph.
    pub fn new(policy: SplitPolicy) -> Self {
        Classifier {
            rules: vec![
                Rule::new("image_placeholder", false, placeholder_rule),
                Rule::new("chapter_title", true, chapter_title_rule),
                Rule::new("subtitle", false, subtitle_rule),
            ],
            policy,
        }
    }

    /// Appends a rule below the existing ones (above the paragraph default).
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn policy(&self) -> SplitPolicy {
        self.policy
    }

    pub fn classify(&self, raw_text: &str) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        let mut seen_first = false;

        for raw_line in raw_text.lines() {
            let line = raw_line.trim();
            if line.is_empty() {
                blocks.push(ContentBlock::Blank);
                continue;
            }

            let is_first = !seen_first;
            seen_first = true;

            let block = self.classify_line(line, is_first);
            if self.policy == SplitPolicy::Paragraphs {
                if let (ContentBlock::Paragraph { text }, Some(ContentBlock::Paragraph { text: previous })) =
                    (&block, blocks.last_mut())
                {
                    previous.push('\n');
                    previous.push_str(text);
                    continue;
                }
            }
            blocks.push(block);
        }
        blocks
    }

    fn classify_line(&self, line: &str, is_first: bool) -> ContentBlock {
        self.rules
            .iter()
            .filter(|rule| is_first || !rule.first_line_only)
            .find_map(|rule| (rule.build)(line))
            .unwrap_or_else(|| ContentBlock::Paragraph {
                text: line.to_string(),
            })
    }
}

fn placeholder_rule(line: &str) -> Option<ContentBlock> {
    let captures = PLACEHOLDER_RE.captures(line)?;
    let tag = captures.get(1)?.as_str().trim();
    Some(ContentBlock::ImagePlaceholder {
        tag: tag.to_string(),
    })
}

fn chapter_title_rule(line: &str) -> Option<ContentBlock> {
    if !CHAPTER_TITLE_RE.is_match(line) {
        return None;
    }
    let (main, sub) = match line.split_once(char::is_whitespace) {
        Some((main, sub)) => (main, sub.trim()),
        None => (line, ""),
    };
    Some(ContentBlock::ChapterTitle {
        main: main.to_string(),
        sub: sub.to_string(),
    })
}

fn subtitle_rule(line: &str) -> Option<ContentBlock> {
    let starts_with_marker = line
        .chars()
        .next()
        .is_some_and(|c| SUBTITLE_MARKERS.contains(&c));
    if starts_with_marker || NUMBERED_RE.is_match(line) {
        Some(ContentBlock::Subtitle {
            text: line.to_string(),
        })
    } else {
        None
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
