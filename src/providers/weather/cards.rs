use chrono::{DateTime, NaiveDate, Timelike};
use chrono_tz::Tz;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::{Condition, CurrentWeather, Forecast, ForecastEntry, Units};
use crate::delivery::ResponsePayload;
use crate::router::City;

/// Days shown in the multi-day summary. The free forecast API stops at five.
const WEEKLY_DAYS: usize = 6;

fn icon(main: &str) -> &'static str {
    match main {
        "Clear" => "☀️",
        "Clouds" => "☁️",
        "Rain" | "Drizzle" => "🌧️",
        "Thunderstorm" => "⛈️",
        "Snow" => "❄️",
        "Mist" | "Fog" | "Haze" | "Smoke" | "Dust" => "🌫️",
        _ => "🌤️",
    }
}

fn accent(main: &str) -> &'static str {
    match main {
        "Clear" => "#F5A623",
        "Rain" | "Drizzle" | "Thunderstorm" => "#4A6FA5",
        "Snow" => "#7FB3D5",
        "Clouds" => "#7D8A96",
        _ => "#4A90E2",
    }
}

fn degrees(value: f64, units: Units) -> String {
    format!("{:.0}{}", value, units.temperature)
}

fn local_time(entry: &ForecastEntry, tz: Tz) -> Option<DateTime<Tz>> {
    DateTime::from_timestamp(entry.dt, 0).map(|utc| utc.with_timezone(&tz))
}

fn button(label: &str, data: String, display: &str) -> Value {
    json!({
        "type": "button",
        "style": "link",
        "height": "sm",
        "action": {
            "type": "postback",
            "label": label,
            "data": data,
            "displayText": display
        }
    })
}

/// Current conditions as a bubble card. With a `postback_city` the footer
/// offers weekly, hourly and refresh buttons for that city.
pub(super) fn current_card(
    observed: &CurrentWeather,
    title: &str,
    postback_city: Option<&str>,
    units: Units,
    observed_at: &str,
) -> ResponsePayload {
    let condition = observed.condition();
    let color = accent(&condition.main);
    let readings = &observed.main;
    let wind = observed.wind.as_ref().map_or(0.0, |w| w.speed);

    let mut bubble = json!({
        "type": "bubble",
        "size": "kilo",
        "header": {
            "type": "box",
            "layout": "vertical",
            "backgroundColor": color,
            "paddingAll": "16px",
            "contents": [
                {"type": "text", "text": format!("{} {}", icon(&condition.main), title),
                 "weight": "bold", "size": "lg", "color": "#FFFFFF", "wrap": true},
                {"type": "text", "text": observed_at, "size": "xs", "color": "#FFFFFF"}
            ]
        },
        "body": {
            "type": "box",
            "layout": "vertical",
            "spacing": "sm",
            "contents": [
                {"type": "text", "text": degrees(readings.temp, units),
                 "size": "3xl", "weight": "bold", "color": color},
                {"type": "text", "text": &condition.description, "color": "#333333", "wrap": true},
                {"type": "text", "size": "sm", "color": "#666666", "wrap": true,
                 "text": format!("Feels like {} · 💧 {:.0}%", degrees(readings.feels_like, units), readings.humidity)},
                {"type": "text", "size": "sm", "color": "#666666", "wrap": true,
                 "text": format!("Low {} / High {} · 💨 {:.1} {}",
                    degrees(readings.temp_min, units), degrees(readings.temp_max, units), wind, units.speed)}
            ]
        }
    });

    if let Some(city) = postback_city {
        bubble["footer"] = json!({
            "type": "box",
            "layout": "horizontal",
            "spacing": "sm",
            "contents": [
                button("Weekly", format!("weekly_forecast_{}", city), "Weekly forecast"),
                button("Hourly", format!("hourly_forecast_{}", city), "Hourly forecast"),
                button("Refresh", format!("refresh_{}", city), "Refresh")
            ]
        });
    }

    let alt_text = format!(
        "Weather in {}: {}, {}",
        title,
        degrees(readings.temp, units),
        condition.description
    );
    ResponsePayload::card(alt_text, bubble)
}

fn entry_line(out: &mut String, time: &DateTime<Tz>, entry: &ForecastEntry, units: Units) {
    let condition = entry.condition();
    let _ = write!(
        out,
        "\n{} {} {}  {}",
        time.format("%H:%M"),
        icon(&condition.main),
        degrees(entry.main.temp, units),
        condition.description
    );
    if entry.pop >= 0.1 {
        let _ = write!(out, " ({:.0}% rain)", entry.pop * 100.0);
    }
}

/// The next day of three-hourly entries in the city's local time.
pub(super) fn hourly_text(city: &City, forecast: &Forecast, units: Units) -> ResponsePayload {
    let mut out = format!("🕒 Hourly forecast for {}", city.name);
    let mut shown = 0;
    for entry in &forecast.list {
        if let Some(time) = local_time(entry, city.timezone) {
            entry_line(&mut out, &time, entry, units);
            shown += 1;
        }
    }
    if shown == 0 {
        return ResponsePayload::text(format!(
            "No hourly forecast is available for {} right now.",
            city.name
        ));
    }
    ResponsePayload::text(out)
}

struct DaySummary<'a> {
    low: f64,
    high: f64,
    max_pop: f64,
    /// The entry closest to local noon describes the day.
    midday: (u32, &'a Condition),
}

impl<'a> DaySummary<'a> {
    fn start(hour: u32, entry: &'a ForecastEntry, condition: &'a Condition) -> Self {
        Self {
            low: entry.main.temp_min.min(entry.main.temp),
            high: entry.main.temp_max.max(entry.main.temp),
            max_pop: entry.pop,
            midday: (hour.abs_diff(12), condition),
        }
    }

    fn add(&mut self, hour: u32, entry: &'a ForecastEntry, condition: &'a Condition) {
        self.low = self.low.min(entry.main.temp_min.min(entry.main.temp));
        self.high = self.high.max(entry.main.temp_max.max(entry.main.temp));
        self.max_pop = self.max_pop.max(entry.pop);
        let distance = hour.abs_diff(12);
        if distance < self.midday.0 {
            self.midday = (distance, condition);
        }
    }
}

static UNKNOWN: Condition = Condition {
    main: String::new(),
    description: String::new(),
};

fn summarize_days<'a>(city: &City, forecast: &'a Forecast) -> BTreeMap<NaiveDate, DaySummary<'a>> {
    let mut days: BTreeMap<NaiveDate, DaySummary<'a>> = BTreeMap::new();
    for entry in &forecast.list {
        let Some(time) = local_time(entry, city.timezone) else {
            continue;
        };
        let condition = entry.weather.first().unwrap_or(&UNKNOWN);
        let hour = time.hour();
        days.entry(time.date_naive())
            .and_modify(|day| day.add(hour, entry, condition))
            .or_insert_with(|| DaySummary::start(hour, entry, condition));
    }
    days
}

/// One local day: a summary line followed by that day's entries.
pub(super) fn day_text(
    city: &City,
    forecast: &Forecast,
    date: NaiveDate,
    units: Units,
) -> ResponsePayload {
    let label = date.format("%a %-d %b");
    let days = summarize_days(city, forecast);
    let Some(summary) = days.get(&date) else {
        return ResponsePayload::text(format!(
            "No forecast is available yet for {} on {}.",
            city.name, label
        ));
    };

    let (_, condition) = summary.midday;
    let mut out = format!(
        "📅 {}, {}\n{} Low {} / High {}, {}",
        city.name,
        label,
        icon(&condition.main),
        degrees(summary.low, units),
        degrees(summary.high, units),
        condition.description
    );
    if summary.max_pop >= 0.1 {
        let _ = write!(out, "\nChance of rain up to {:.0}%", summary.max_pop * 100.0);
    }
    out.push('\n');
    for entry in &forecast.list {
        if let Some(time) = local_time(entry, city.timezone)
            && time.date_naive() == date
        {
            entry_line(&mut out, &time, entry, units);
        }
    }
    ResponsePayload::text(out)
}

/// Per-day low/high for every day the forecast covers.
pub(super) fn weekly_text(city: &City, forecast: &Forecast, units: Units) -> ResponsePayload {
    let days = summarize_days(city, forecast);
    if days.is_empty() {
        return ResponsePayload::text(format!(
            "No forecast is available for {} right now.",
            city.name
        ));
    }
    let mut out = format!("📆 Forecast for {}", city.name);
    for (date, summary) in days.iter().take(WEEKLY_DAYS) {
        let (_, condition) = summary.midday;
        let _ = write!(
            out,
            "\n{} {} {} – {}  {}",
            date.format("%a %-d"),
            icon(&condition.main),
            degrees(summary.low, units),
            degrees(summary.high, units),
            condition.description
        );
    }
    ResponsePayload::text(out)
}
