use regex::Regex;
use std::sync::LazyLock;

/// Compiled regex patterns that are reused across the codebase
pub struct RegexPatterns;

impl RegexPatterns {
    /// Three or more consecutive newlines
    pub fn excess_newlines() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\n{3,}").expect("Failed to compile excess newline regex")
        });
        &RE
    }

    /// `YYYY-MM-DD` date prefix used by daily-detail postbacks
    pub fn iso_date_prefix() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(\d{4}-\d{2}-\d{2})_(.+)$").expect("Failed to compile date prefix regex")
        });
        &RE
    }

    /// A YouTube watch, shorts or short-link URL
    pub fn youtube_url() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"https?://(?:(?:www\.|m\.)?youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)[\w-]+",
            )
            .expect("Failed to compile YouTube URL regex")
        });
        &RE
    }

    /// Words that ask for a video search rather than describe what to search for
    pub fn video_request_words() -> &'static Regex {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(
                r"(?i)\b(?:youtube|videos?|clips?|search|find|show|watch|me|for|on|of|about|some|please|a|an|the)\b|ยูทูป|ยูทูบ|วิดีโอ|คลิป|ค้นหา|動画|ユーチューブ|を?検索して|を?探して",
            )
            .expect("Failed to compile video request regex")
        });
        &RE
    }
}
