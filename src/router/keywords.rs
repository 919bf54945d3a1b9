pub(super) const WEATHER: &[&str] = &[
    "อากาศ",
    "สภาพอากาศ",
    "ฝน",
    "แดด",
    "หนาว",
    "ร้อน",
    "เมฆ",
    "ลม",
    "อุณหภูมิ",
    "พยากรณ์",
    "weather",
    "forecast",
    "rain",
    "temperature",
    "天気",
    "天気予報",
];

pub(super) const TIME: &[&str] = &[
    "เวลา",
    "วันที่",
    "กี่โมง",
    "ตอนนี้",
    "time",
    "date",
    "時間",
    "日付",
    "何時",
];

pub(super) const WEEKLY: &[&str] = &["รายสัปดาห์", "weekly", "週間"];

pub(super) const HOURLY: &[&str] = &["รายชั่วโมง", "hourly", "毎時"];

pub(super) const DAY_AFTER_TOMORROW: &[&str] = &["มะรืน", "明後日"];

pub(super) const TOMORROW: &[&str] = &["พรุ่งนี้", "tomorrow", "明日"];

pub(super) const VIDEO: &[&str] = &[
    "youtube",
    "video",
    "videos",
    "clip",
    "clips",
    "ยูทูป",
    "ยูทูบ",
    "วิดีโอ",
    "คลิป",
    "動画",
    "ユーチューブ",
];

/// A message prepared for keyword matching.
///
/// ASCII keywords match whole words only, so "time" does not fire on
/// "sometimes". Thai and Japanese are written without spaces, so their
/// keywords match as substrings.
#[derive(Debug)]
pub struct NormalizedMessage {
    original: String,
    lower: String,
    words: Vec<String>,
}

impl NormalizedMessage {
    pub fn new(text: &str) -> Self {
        let original = text.trim().to_string();
        let lower = original.to_lowercase();
        let words = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            original,
            lower,
            words,
        }
    }

    /// The trimmed message with its case intact.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn mentions(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if keyword.is_ascii() {
            self.words.iter().any(|w| *w == keyword)
        } else {
            self.lower.contains(&keyword)
        }
    }

    pub fn mentions_any(&self, keywords: &[&str]) -> bool {
        keywords.iter().any(|k| self.mentions(k))
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}
