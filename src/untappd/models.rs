use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::UntappdError;

#[derive(Debug, Clone, PartialEq)]
pub struct Checkin {
    pub id: u64,
    pub user_name: String,
    pub beer: Beer,
    pub brewery: Brewery,
    pub rating: f64,
    pub comment: String,
    pub created: DateTime<Utc>,
    pub venue: Option<Venue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Beer {
    pub id: u64,
    pub name: String,
    pub style: String,
    pub abv: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brewery {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    pub name: String,
}

/// Oldest first; the identifier breaks ties between equal timestamps.
pub fn sort_chronologically(checkins: &mut [Checkin]) {
    checkins.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    meta: Meta,
    #[serde(default)]
    response: Value,
}

#[derive(Debug, Deserialize)]
struct Meta {
    code: u16,
    #[serde(default)]
    error_detail: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckinsResponse {
    checkins: CheckinPage,
}

#[derive(Debug, Deserialize)]
struct CheckinPage {
    #[serde(default)]
    items: Vec<WireCheckin>,
}

#[derive(Debug, Deserialize)]
struct WireCheckin {
    checkin_id: u64,
    created_at: String,
    #[serde(default)]
    checkin_comment: Option<String>,
    #[serde(default)]
    rating_score: Option<f64>,
    user: WireUser,
    beer: WireBeer,
    brewery: WireBrewery,
    // Untappd sends `[]` instead of an object when a check-in has no venue.
    #[serde(default)]
    venue: Value,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    user_name: String,
}

#[derive(Debug, Deserialize)]
struct WireBeer {
    bid: u64,
    beer_name: String,
    #[serde(default)]
    beer_style: String,
    #[serde(default)]
    beer_abv: f64,
}

#[derive(Debug, Deserialize)]
struct WireBrewery {
    brewery_name: String,
}

impl Envelope {
    pub(crate) fn into_checkins(self) -> Result<Vec<Checkin>, UntappdError> {
        if self.meta.code != 200 {
            let detail = self
                .meta
                .error_detail
                .or(self.meta.error_type)
                .unwrap_or_else(|| "no error detail".to_string());
            return Err(UntappdError::Api {
                code: self.meta.code,
                detail,
            });
        }

        let response: CheckinsResponse = serde_json::from_value(self.response)
            .map_err(|e| UntappdError::Decode(e.to_string()))?;
        response
            .checkins
            .items
            .into_iter()
            .map(Checkin::try_from)
            .collect()
    }
}

impl TryFrom<WireCheckin> for Checkin {
    type Error = UntappdError;

    fn try_from(wire: WireCheckin) -> Result<Self, Self::Error> {
        let created = DateTime::parse_from_rfc2822(&wire.created_at)
            .map_err(|e| {
                UntappdError::Decode(format!(
                    "checkin {} has invalid created_at {:?}: {e}",
                    wire.checkin_id, wire.created_at
                ))
            })?
            .with_timezone(&Utc);

        let venue = wire
            .venue
            .get("venue_name")
            .and_then(Value::as_str)
            .map(|name| Venue {
                name: name.to_string(),
            });

        Ok(Checkin {
            id: wire.checkin_id,
            user_name: wire.user.user_name,
            beer: Beer {
                id: wire.beer.bid,
                name: wire.beer.beer_name,
                style: wire.beer.beer_style,
                abv: wire.beer.beer_abv,
            },
            brewery: Brewery {
                name: wire.brewery.brewery_name,
            },
            rating: wire.rating_score.unwrap_or_default(),
            comment: wire.checkin_comment.unwrap_or_default(),
            created,
            venue,
        })
    }
}
