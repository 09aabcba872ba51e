//! Rows of the SOCIO tables and the request payloads that create them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Fest {
    pub fest_id: String,
    pub title: String,
    pub description: Option<String>,
    pub opening_date: NaiveDate,
    pub closing_date: NaiveDate,
    pub organizing_dept: Option<String>,
    pub fest_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Parent fest; `None` for standalone events
    pub fest: Option<String>,
    pub event_image_url: Option<String>,
    pub banner_url: Option<String>,
    pub pdf_url: Option<String>,
}

impl Event {
    pub fn is_standalone(&self) -> bool {
        self.fest.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub registration_id: String,
    pub event_id: String,
    pub user_email: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub email: String,
    pub name: Option<String>,
    pub is_organiser: bool,
    pub created_at: DateTime<Utc>,
}

/// The columns of an expired fest the cleanup job needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExpiredFest {
    pub fest_id: String,
    pub fest_image_url: Option<String>,
}

/// The columns of an expired event the cleanup job needs.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExpiredEvent {
    pub event_id: String,
    pub event_image_url: Option<String>,
    pub banner_url: Option<String>,
    pub pdf_url: Option<String>,
}

impl From<&Fest> for ExpiredFest {
    fn from(fest: &Fest) -> Self {
        Self {
            fest_id: fest.fest_id.clone(),
            fest_image_url: fest.fest_image_url.clone(),
        }
    }
}

impl From<&Event> for ExpiredEvent {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.event_id.clone(),
            event_image_url: event.event_image_url.clone(),
            banner_url: event.banner_url.clone(),
            pdf_url: event.pdf_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFest {
    pub fest_id: String,
    pub title: String,
    pub description: Option<String>,
    pub opening_date: NaiveDate,
    pub closing_date: NaiveDate,
    pub organizing_dept: Option<String>,
    pub fest_image_url: Option<String>,
}

impl From<NewFest> for Fest {
    fn from(new: NewFest) -> Self {
        Self {
            fest_id: new.fest_id,
            title: new.title,
            description: new.description,
            opening_date: new.opening_date,
            closing_date: new.closing_date,
            organizing_dept: new.organizing_dept,
            fest_image_url: new.fest_image_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub event_date: NaiveDate,
    pub end_date: NaiveDate,
    pub fest: Option<String>,
    pub event_image_url: Option<String>,
    pub banner_url: Option<String>,
    pub pdf_url: Option<String>,
}

impl From<NewEvent> for Event {
    fn from(new: NewEvent) -> Self {
        Self {
            event_id: new.event_id,
            title: new.title,
            description: new.description,
            event_date: new.event_date,
            end_date: new.end_date,
            fest: new.fest,
            event_image_url: new.event_image_url,
            banner_url: new.banner_url,
            pdf_url: new.pdf_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRegistration {
    pub event_id: String,
    pub user_email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
}
