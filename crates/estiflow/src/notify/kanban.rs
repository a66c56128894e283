//! Tracking cards on a kanban board (Trello's REST API, key/token auth as
//! query parameters).

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::KanbanConfig;
use crate::notify::DeliveryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRef {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

pub trait KanbanBoard: Send + Sync {
    fn create_card(&self, name: &str, desc: &str) -> Result<CardRef, DeliveryError>;

    fn attach_url(&self, card: &CardRef, url: &str, name: Option<&str>)
        -> Result<(), DeliveryError>;
}

#[derive(Debug)]
pub struct TrelloBoard {
    client: reqwest::blocking::Client,
    base_url: String,
    key: String,
    token: String,
    list_id: String,
}

#[derive(Deserialize)]
struct CardDto {
    id: String,
    #[serde(default, rename = "shortUrl")]
    short_url: Option<String>,
}

impl TrelloBoard {
    pub fn new(config: &KanbanConfig) -> Result<Self, DeliveryError> {
        let (key, token, list_id) = match (&config.key, &config.token, &config.list_id) {
            (Some(key), Some(token), Some(list_id)) => {
                (key.clone(), token.clone(), list_id.clone())
            }
            _ => {
                return Err(DeliveryError::Config(
                    "kanban requires key, token and list_id".to_string(),
                ))
            }
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.trello.com/1".to_string(),
            key,
            token,
            list_id,
        })
    }
}

impl KanbanBoard for TrelloBoard {
    fn create_card(&self, name: &str, desc: &str) -> Result<CardRef, DeliveryError> {
        let response = self
            .client
            .post(format!("{}/cards", self.base_url))
            .query(&[
                ("key", self.key.as_str()),
                ("token", self.token.as_str()),
                ("idList", self.list_id.as_str()),
                ("name", name),
                ("desc", desc),
            ])
            .send()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?
            .error_for_status()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?;

        let dto: CardDto = response
            .json()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?;
        Ok(CardRef {
            id: dto.id,
            url: dto.short_url,
        })
    }

    fn attach_url(
        &self,
        card: &CardRef,
        url: &str,
        name: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.client
            .post(format!("{}/cards/{}/attachments", self.base_url, card.id))
            .query(&[
                ("key", self.key.as_str()),
                ("token", self.token.as_str()),
                ("url", url),
                ("name", name.unwrap_or(url)),
            ])
            .send()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?
            .error_for_status()
            .map_err(|e| DeliveryError::Kanban(e.to_string()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreatedCard {
    pub name: String,
    pub desc: String,
}

#[derive(Default)]
pub struct FakeBoard {
    cards: Mutex<Vec<CreatedCard>>,
    attachments: Mutex<Vec<(String, String)>>,
    fail_next: std::sync::atomic::AtomicBool,
}

impl FakeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self) {
        self.fail_next
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn cards(&self) -> Vec<CreatedCard> {
        self.cards.lock().expect("fake board lock").clone()
    }

    /// `(card_id, url)` pairs recorded by `attach_url`.
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.attachments.lock().expect("fake board lock").clone()
    }
}

impl KanbanBoard for FakeBoard {
    fn create_card(&self, name: &str, desc: &str) -> Result<CardRef, DeliveryError> {
        if self
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(DeliveryError::Kanban("fake board armed to fail".to_string()));
        }
        let mut cards = self.cards.lock().expect("fake board lock");
        cards.push(CreatedCard {
            name: name.to_string(),
            desc: desc.to_string(),
        });
        Ok(CardRef {
            id: format!("card-{}", cards.len()),
            url: None,
        })
    }

    fn attach_url(
        &self,
        card: &CardRef,
        url: &str,
        _name: Option<&str>,
    ) -> Result<(), DeliveryError> {
        self.attachments
            .lock()
            .expect("fake board lock")
            .push((card.id.clone(), url.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trello_requires_credentials() {
        let config = KanbanConfig::default();
        assert!(matches!(
            TrelloBoard::new(&config).unwrap_err(),
            DeliveryError::Config(_)
        ));
    }

    #[test]
    fn test_fake_board_records_cards() {
        let board = FakeBoard::new();
        let card = board.create_card("Estimate EST-1 / Acme", "Automated").unwrap();
        assert_eq!(card.id, "card-1");
        assert_eq!(board.cards()[0].name, "Estimate EST-1 / Acme");

        board.attach_url(&card, "file:///fs/Estimate.pdf", None).unwrap();
        assert_eq!(
            board.attachments(),
            vec![("card-1".to_string(), "file:///fs/Estimate.pdf".to_string())]
        );
    }

    #[test]
    fn test_fake_board_armed_failure() {
        let board = FakeBoard::new();
        board.fail_next();
        assert!(board.create_card("x", "y").is_err());
        assert!(board.create_card("x", "y").is_ok());
    }
}
