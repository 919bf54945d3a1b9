//! Language detection and the canned texts the bot sends when it cannot
//! produce a real answer (apologies, timeouts, clarifications).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "th")]
    Thai,
    #[serde(rename = "ja")]
    Japanese,
}

impl Language {
    /// Guess the language of a message from its script.
    ///
    /// Thai script wins over kana/CJK; anything else falls back to `default`.
    pub fn detect(text: &str, default: Language) -> Language {
        let mut japanese = false;
        for c in text.chars() {
            match c {
                '\u{0E00}'..='\u{0E7F}' => return Language::Thai,
                '\u{3040}'..='\u{30FF}' | '\u{4E00}'..='\u{9FFF}' => japanese = true,
                _ => {}
            }
        }
        if japanese {
            Language::Japanese
        } else if text.chars().any(|c| c.is_ascii_alphabetic()) {
            Language::English
        } else {
            default
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Thai => "th",
            Language::Japanese => "ja",
        }
    }

    /// English name, for instructing the assistant which language to answer in.
    pub fn name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Thai => "Thai",
            Language::Japanese => "Japanese",
        }
    }
}

pub fn apology(lang: Language) -> &'static str {
    match lang {
        Language::English => "🔧 Sorry, something went wrong. Please try again.",
        Language::Thai => "🔧 ขออภัยครับ เกิดข้อผิดพลาด กรุณาลองใหม่อีกครั้ง",
        Language::Japanese => "🔧 申し訳ありません。エラーが発生しました。もう一度お試しください。",
    }
}

pub fn timeout_notice(lang: Language) -> &'static str {
    match lang {
        Language::English => "⏰ That took too long to process. Please try again.",
        Language::Thai => "⏰ การประมวลผลใช้เวลานานเกินไป กรุณาลองใหม่อีกครั้ง",
        Language::Japanese => "⏰ 処理に時間がかかりすぎました。もう一度お試しください。",
    }
}

pub fn ask_city(lang: Language) -> &'static str {
    match lang {
        Language::English => "🌤️ Which city would you like the weather for?",
        Language::Thai => "🌤️ คุณต้องการทราบสภาพอากาศของเมืองอะไรครับ?",
        Language::Japanese => "🌤️ どの都市の天気を知りたいですか？",
    }
}

pub fn unsupported(lang: Language) -> &'static str {
    match lang {
        Language::English => "🤔 Sorry, I can't handle that kind of message yet.",
        Language::Thai => "🤔 ขออภัยครับ ยังไม่รองรับข้อความประเภทนี้",
        Language::Japanese => "🤔 申し訳ありません。このタイプのメッセージにはまだ対応していません。",
    }
}

pub fn file_too_large(lang: Language) -> &'static str {
    match lang {
        Language::English => "📁 That file is too large (10 MB max).",
        Language::Thai => "📁 ไฟล์มีขนาดใหญ่เกินไป (สูงสุด 10MB)",
        Language::Japanese => "📁 ファイルが大きすぎます（最大10MB）。",
    }
}

/// Lead-in sent above the video results card.
pub fn video_results_intro(lang: Language, topic: &str) -> String {
    match lang {
        Language::English => format!("🎬 Here are some videos about \"{}\":", topic),
        Language::Thai => format!("🎬 นี่คือวิดีโอเกี่ยวกับ \"{}\" ครับ", topic),
        Language::Japanese => format!("🎬「{}」の動画はこちらです：", topic),
    }
}

pub fn no_videos(lang: Language) -> &'static str {
    match lang {
        Language::English => "🎬 I couldn't find any videos for that. Try different words?",
        Language::Thai => "🎬 ไม่พบวิดีโอที่เกี่ยวข้อง ลองใช้คำค้นหาอื่นดูนะครับ",
        Language::Japanese => "🎬 動画が見つかりませんでした。別のキーワードでお試しください。",
    }
}

/// Instruction for summarizing a linked video.
pub fn video_summary_prompt(lang: Language) -> String {
    format!(
        "Summarize this YouTube video in a few short paragraphs: what it is about and its key points. Reply in {}.",
        lang.name()
    )
}

/// Fallback alt text for a rich card that arrived without one.
pub fn default_alt_text(lang: Language) -> &'static str {
    match lang {
        Language::English => "New message",
        Language::Thai => "ข้อความใหม่",
        Language::Japanese => "新しいメッセージ",
    }
}
