// SPDX-License-Identifier: GPL-3.0-only

//! Wire types of the recognition backend

use serde::{Deserialize, Deserializer, Serialize};

/// Price snapshot as reported by the backend (decimal strings)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardPrices {
    pub usd: Option<String>,
    pub usd_foil: Option<String>,
    pub usd_etched: Option<String>,
    pub eur: Option<String>,
    pub eur_foil: Option<String>,
    pub tix: Option<String>,
}

/// Card artwork URLs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageUris {
    pub small: Option<String>,
    pub normal: Option<String>,
    pub large: Option<String>,
    pub png: Option<String>,
    pub art_crop: Option<String>,
    pub border_crop: Option<String>,
}

/// Body of a recognition response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub predicted_card_id: Option<String>,
    pub predicted_card_name: Option<String>,
    pub finishes: Vec<String>,
    pub set: Option<String>,
    pub set_name: Option<String>,
    pub prices: CardPrices,
    pub image_uris: ImageUris,
    #[serde(deserialize_with = "string_or_number")]
    pub collector_number: Option<String>,
}

impl RecognitionResponse {
    /// A response without a predicted id is a no-match, not an error
    pub fn into_recognition(self) -> Recognition {
        let Some(card_id) = self.predicted_card_id.filter(|id| !id.is_empty()) else {
            return Recognition::NoMatch;
        };
        Recognition::Match(RecognitionMatch {
            name: self.predicted_card_name.unwrap_or_else(|| card_id.clone()),
            card_id,
            finishes: self.finishes,
            set: self.set.unwrap_or_default(),
            set_name: self.set_name.unwrap_or_default(),
            prices: self.prices,
            image_uris: self.image_uris,
            collector_number: self.collector_number.unwrap_or_default(),
        })
    }
}

/// An identified card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionMatch {
    pub card_id: String,
    pub name: String,
    pub finishes: Vec<String>,
    pub set: String,
    pub set_name: String,
    pub prices: CardPrices,
    pub image_uris: ImageUris,
    pub collector_number: String,
}

/// Terminal outcome of a successful submission
#[derive(Debug, Clone, PartialEq)]
pub enum Recognition {
    Match(RecognitionMatch),
    NoMatch,
}

/// Body of a session creation response
#[derive(Debug, Clone, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

/// Body of a session poll response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionPollResponse {
    pub completed: bool,
    #[serde(deserialize_with = "string_or_number")]
    pub result_id: Option<String>,
    pub result: Option<RecognitionResponse>,
}

/// Interpreted poll result
#[derive(Debug, Clone, PartialEq)]
pub enum SessionPoll {
    /// Nothing submitted yet
    Pending,
    /// A capture from the second device was recognized
    Completed {
        result_id: String,
        recognition: Recognition,
    },
}

impl SessionPollResponse {
    /// `None` when the backend marks the result complete but omits its id
    pub fn into_poll(self) -> Option<SessionPoll> {
        if !self.completed {
            return Some(SessionPoll::Pending);
        }
        let result_id = self.result_id.filter(|id| !id.is_empty())?;
        let recognition = self
            .result
            .map(RecognitionResponse::into_recognition)
            .unwrap_or(Recognition::NoMatch);
        Some(SessionPoll::Completed {
            result_id,
            recognition,
        })
    }
}

/// An encoded region image ready for upload
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub file_name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Ids arrive as strings from some endpoints and as integers from others
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
