//! Turns one inbound event into the payloads to send back.
//!
//! Handlers do the I/O the router deliberately avoids: they persist context
//! updates, read and append conversation history, and call the AI, weather,
//! video search and messaging collaborators. Deadline checks and delivery live in the
//! dispatcher.

pub mod media;
mod time_card;
mod video;

pub use time_card::time_card;
pub use video::video_card;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::channels::{FetchedContent, MessagingClient};
use crate::context::{ContextManager, ContextState, ContextUpdate};
use crate::delivery::ResponsePayload;
use crate::events::{EventPayload, InboundEvent, MediaKind};
use crate::providers::{AiAssistant, AiRequest, Attachment, VideoSearch, WeatherProvider};
use crate::replies::{self, Language};
use crate::router::{self, City, CityDirectory, Classification, ForecastHorizon, Intent, PostbackAction};
use crate::store::{ConversationTurn, HistoryStore};
use crate::utils::http::DEFAULT_MAX_BODY_BYTES;

/// The collaborators handlers call out to.
#[derive(Clone)]
pub struct Services {
    pub ai: Arc<dyn AiAssistant>,
    pub weather: Arc<dyn WeatherProvider>,
    pub video: Arc<dyn VideoSearch>,
    pub messenger: Arc<dyn MessagingClient>,
    pub context: ContextManager,
    pub history: Arc<dyn HistoryStore>,
}

#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub cities: CityDirectory,
    /// Turns of history sent with a general question.
    pub history_window: usize,
    pub max_media_bytes: usize,
    pub bot_name: String,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            cities: CityDirectory::builtin(),
            history_window: 10,
            max_media_bytes: DEFAULT_MAX_BODY_BYTES,
            bot_name: "Kaze".to_string(),
        }
    }
}

pub struct Handlers {
    services: Services,
    settings: HandlerSettings,
}

impl Handlers {
    pub fn new(services: Services, settings: HandlerSettings) -> Self {
        Self { services, settings }
    }

    pub fn cities(&self) -> &CityDirectory {
        &self.settings.cities
    }

    /// Handle any supported event.
    pub async fn handle(&self, event: &InboundEvent, lang: Language) -> Result<Vec<ResponsePayload>> {
        let user_id = event.user_id.as_str();
        match &event.payload {
            EventPayload::Text(text) => self.handle_text(user_id, text, lang).await,
            EventPayload::Postback { data } => self.handle_postback(user_id, data, lang).await,
            EventPayload::Media {
                kind,
                message_id,
                file_name,
            } => {
                self.handle_media(user_id, *kind, message_id, file_name.as_deref(), lang)
                    .await
            }
            EventPayload::Location {
                latitude,
                longitude,
                title,
                address,
            } => {
                let place = address.as_deref().or(title.as_deref());
                self.handle_location(user_id, *latitude, *longitude, place, lang)
                    .await
            }
            EventPayload::Unsupported { message_type } => {
                debug!("unsupported message type '{}' from {}", message_type, user_id);
                Ok(vec![ResponsePayload::text(replies::unsupported(lang))])
            }
        }
    }

    /// Classify a text message against the user's context and execute the intent.
    pub async fn handle_text(
        &self,
        user_id: &str,
        text: &str,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let ctx = self.load_context(user_id).await;
        let Classification { intent, update } = router::classify(text, &ctx, &self.settings.cities);
        debug!("classified message from {} as {:?}", user_id, intent);
        self.store_context(user_id, update).await;

        let payload = match intent {
            Intent::NoCity => ResponsePayload::text(replies::ask_city(lang)),
            Intent::WeatherCurrent(city) => self.services.weather.current(&city).await?,
            Intent::WeatherWeekly(city) => self.forecast(&city, ForecastHorizon::Weekly).await?,
            Intent::WeatherHourly(city) => self.forecast(&city, ForecastHorizon::Hourly).await?,
            Intent::ContextualFollowUp { city, horizon } => self.forecast(&city, horizon).await?,
            Intent::TimeQuery => time_card(Utc::now()),
            Intent::VideoSearch(topic) => {
                return self.search_videos(user_id, text, &topic, lang).await;
            }
            Intent::VideoSummary(url) => {
                return self.summarize_video(user_id, &url, lang).await;
            }
            Intent::General => return self.ask_assistant(user_id, text, lang).await,
        };
        Ok(vec![payload])
    }

    /// Button presses. Weather actions for a known city go straight to the
    /// weather service; anything else is answered by the assistant.
    pub async fn handle_postback(
        &self,
        user_id: &str,
        data: &str,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let action = PostbackAction::parse(data);
        self.store_context(user_id, action.context_update(&self.settings.cities))
            .await;

        let resolved = action
            .city()
            .and_then(|name| self.settings.cities.by_name(name));
        match (&action, resolved) {
            (PostbackAction::Current { .. }, Some(city)) => {
                Ok(vec![self.services.weather.current(city).await?])
            }
            (PostbackAction::Forecast { horizon, .. }, Some(city)) => {
                Ok(vec![self.forecast(city, *horizon).await?])
            }
            _ => {
                debug!("postback '{}' has no direct action, asking the assistant", data);
                let prompt = format!(
                    "The user tapped a button labelled with the data \"{}\". Respond helpfully in {}.",
                    data,
                    lang.name()
                );
                let request = AiRequest::new(prompt).with_system(self.system_prompt(Utc::now()));
                let answer = self.services.ai.generate(&request).await?;
                Ok(vec![ResponsePayload::text(answer)])
            }
        }
    }

    /// Download an attachment and ask the assistant about it.
    pub async fn handle_media(
        &self,
        user_id: &str,
        kind: MediaKind,
        message_id: &str,
        file_name: Option<&str>,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let fetched = self
            .services
            .messenger
            .fetch_content(message_id, self.settings.max_media_bytes)
            .await?;
        let (data, content_type) = match fetched {
            FetchedContent::TooLarge => {
                warn!("{} from {} exceeds the media size limit", kind.as_str(), user_id);
                return Ok(vec![ResponsePayload::text(replies::file_too_large(lang))]);
            }
            FetchedContent::Content {
                bytes,
                content_type,
            } => (bytes, content_type),
        };
        if data.is_empty() {
            bail!("{} {} downloaded empty", kind.as_str(), message_id);
        }

        let mime_type = media::mime_type(kind, file_name, content_type.as_deref(), &data);
        debug!(
            "analyzing {} ({}, {} bytes) for {}",
            kind.as_str(),
            mime_type,
            data.len(),
            user_id
        );
        let request = AiRequest::new(media::prompt(kind, file_name, lang))
            .with_system(self.system_prompt(Utc::now()))
            .with_attachment(Attachment { mime_type, data });
        let answer = self.services.ai.generate(&request).await?;
        self.remember(user_id, media::history_entry(kind, file_name), &answer)
            .await;
        Ok(vec![ResponsePayload::text(answer)])
    }

    /// Describe a shared location and show the weather there. Either half may
    /// fail on its own; the event fails only when both do.
    pub async fn handle_location(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        place: Option<&str>,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let described = match place {
            Some(place) => format!("{} ({:.5}, {:.5})", place, latitude, longitude),
            None => format!("({:.5}, {:.5})", latitude, longitude),
        };
        let request = AiRequest::new(format!(
            "The user shared a location: {}. Briefly describe this place and what is useful to know nearby. Reply in {}.",
            described,
            lang.name()
        ))
        .with_system(self.system_prompt(Utc::now()));

        let (answer, weather) = tokio::join!(
            self.services.ai.generate(&request),
            self.services.weather.current_at(latitude, longitude)
        );

        let mut payloads = Vec::with_capacity(2);
        let mut first_error = None;
        match answer {
            Ok(answer) => payloads.push(ResponsePayload::text(answer)),
            Err(e) => {
                warn!("location description failed for {}: {}", user_id, e);
                first_error = Some(e);
            }
        }
        match weather {
            Ok(card) => payloads.push(card),
            Err(e) => {
                warn!("location weather failed for {}: {}", user_id, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) if payloads.is_empty() => Err(e),
            _ => Ok(payloads),
        }
    }

    async fn ask_assistant(
        &self,
        user_id: &str,
        text: &str,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let history = match self
            .services
            .history
            .recent(user_id, self.settings.history_window)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                warn!("history unavailable for {}: {}", user_id, e);
                Vec::new()
            }
        };
        let request = AiRequest::new(text)
            .with_system(format!(
                "{} The user is writing in {}.",
                self.system_prompt(Utc::now()),
                lang.name()
            ))
            .with_history(history);
        let answer = self.services.ai.generate(&request).await?;
        self.remember(user_id, text, &answer).await;
        Ok(vec![ResponsePayload::text(answer)])
    }

    async fn search_videos(
        &self,
        user_id: &str,
        text: &str,
        topic: &str,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let videos = self.services.video.search(topic).await?;
        if videos.is_empty() {
            debug!("no videos for '{}'", topic);
            return Ok(vec![ResponsePayload::text(replies::no_videos(lang))]);
        }
        let intro = replies::video_results_intro(lang, topic);
        let card = video_card(&videos);
        self.remember(user_id, text, &format!("{}\n{}", intro, card.plain_text()))
            .await;
        Ok(vec![ResponsePayload::text(intro), card])
    }

    async fn summarize_video(
        &self,
        user_id: &str,
        url: &str,
        lang: Language,
    ) -> Result<Vec<ResponsePayload>> {
        let request = AiRequest::new(replies::video_summary_prompt(lang))
            .with_system(self.system_prompt(Utc::now()))
            .with_video(url);
        let answer = self.services.ai.generate(&request).await?;
        self.remember(user_id, format!("[User sent YouTube link: {}]", url), &answer)
            .await;
        Ok(vec![ResponsePayload::text(answer)])
    }

    async fn forecast(&self, city: &City, horizon: ForecastHorizon) -> Result<ResponsePayload> {
        self.services.weather.forecast(city, horizon).await
    }

    /// Context is best effort: a store failure reads as no context.
    async fn load_context(&self, user_id: &str) -> ContextState {
        self.services
            .context
            .get(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!("context unavailable for {}: {}", user_id, e);
                ContextState::default()
            })
    }

    async fn store_context(&self, user_id: &str, update: ContextUpdate) {
        if let Err(e) = self.services.context.apply(user_id, update).await {
            warn!("failed to update context for {}: {}", user_id, e);
        }
    }

    async fn remember(&self, user_id: &str, user_message: impl Into<String>, answer: &str) {
        let turn = ConversationTurn::new(user_message, answer);
        if let Err(e) = self.services.history.append(user_id, turn).await {
            warn!("failed to record history for {}: {}", user_id, e);
        }
    }

    fn system_prompt(&self, now: DateTime<Utc>) -> String {
        let tokyo = now.with_timezone(&chrono_tz::Asia::Tokyo);
        format!(
            "You are {}, a friendly assistant in a chat app. Keep answers short and easy to read on a phone. \
             Reply in the language the user writes in. Current time: {} JST.",
            self.settings.bot_name,
            tokyo.format("%Y-%m-%d %H:%M")
        )
    }
}
