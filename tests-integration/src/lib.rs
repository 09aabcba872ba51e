/// Common test utilities and helpers for integration tests
use chrono::NaiveDate;
use common::Database;
use common::model::{Event, Fest, NewEvent, NewFest, NewRegistration, Registration};
use common::storage::{Bucket, ObjectStoreFiles, PublicUrlBase};
use object_store::{ObjectStore, PutPayload, memory::InMemory, path::Path};
use std::collections::HashMap;
use std::sync::Arc;

pub mod fake_supabase;

pub const PROJECT_URL: &str = "https://demo.supabase.co";
pub const STORAGE_BASE: &str = "https://demo.supabase.co/storage/v1/object/public";

/// Initialize test logging
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A day in March 2025
pub fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).expect("valid day in March")
}

pub fn public_base() -> PublicUrlBase {
    PublicUrlBase::parse(PROJECT_URL).expect("valid project URL")
}

pub fn public_url(bucket: Bucket, path: &str) -> String {
    format!("{STORAGE_BASE}/{}/{path}", bucket.as_str())
}

/// One in-memory object store per bucket, wired into an [`ObjectStoreFiles`].
pub struct BucketStores {
    pub files: ObjectStoreFiles,
    stores: HashMap<&'static str, Arc<InMemory>>,
}

impl Default for BucketStores {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketStores {
    pub fn new() -> Self {
        let mut files = ObjectStoreFiles::new();
        let mut stores = HashMap::new();
        for bucket in Bucket::ALL {
            let store = Arc::new(InMemory::new());
            files = files.with_bucket(bucket.as_str(), store.clone());
            stores.insert(bucket.as_str(), store);
        }
        Self { files, stores }
    }

    fn bucket(&self, bucket: &str) -> &Arc<InMemory> {
        self.stores
            .get(bucket)
            .unwrap_or_else(|| panic!("unknown bucket {bucket}"))
    }

    /// Upload the object a public URL points at
    pub async fn upload_url(&self, url: Option<&str>) {
        let Some(url) = url else { return };
        let (bucket, path) = url
            .strip_prefix(STORAGE_BASE)
            .and_then(|rest| rest.trim_start_matches('/').split_once('/'))
            .unwrap_or_else(|| panic!("not a storage URL: {url}"));
        self.bucket(bucket)
            .put(&Path::from(path), PutPayload::from_static(b"upload"))
            .await
            .expect("Failed to upload test object");
    }

    pub async fn upload_fest(&self, fest: &Fest) {
        self.upload_url(fest.fest_image_url.as_deref()).await;
    }

    pub async fn upload_event(&self, event: &Event) {
        self.upload_url(event.event_image_url.as_deref()).await;
        self.upload_url(event.banner_url.as_deref()).await;
        self.upload_url(event.pdf_url.as_deref()).await;
    }

    pub async fn exists(&self, bucket: Bucket, path: &str) -> bool {
        self.bucket(bucket.as_str())
            .head(&Path::from(path))
            .await
            .is_ok()
    }

    pub async fn count(&self, bucket: Bucket) -> usize {
        use futures::TryStreamExt;

        self.bucket(bucket.as_str())
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .expect("Failed to list test objects")
            .len()
    }

    pub async fn total(&self) -> usize {
        let mut total = 0;
        for bucket in Bucket::ALL {
            total += self.count(bucket).await;
        }
        total
    }
}

/// Insert a fest whose image lives in `fest-images/<id>.png`.
pub async fn seed_fest(db: &Database, id: &str, opening: NaiveDate, closing: NaiveDate) -> Fest {
    db.insert_fest(NewFest {
        fest_id: id.to_string(),
        title: format!("Fest {id}"),
        description: None,
        opening_date: opening,
        closing_date: closing,
        organizing_dept: Some("Computer Science".to_string()),
        fest_image_url: Some(public_url(Bucket::FestImages, &format!("{id}.png"))),
    })
    .await
    .expect("Failed to insert fest")
}

/// Insert an event with an image, a banner and a PDF.
pub async fn seed_event(db: &Database, id: &str, end: NaiveDate, fest: Option<&str>) -> Event {
    db.insert_event(NewEvent {
        event_id: id.to_string(),
        title: format!("Event {id}"),
        description: None,
        event_date: end,
        end_date: end,
        fest: fest.map(str::to_string),
        event_image_url: Some(public_url(Bucket::EventImages, &format!("{id}.png"))),
        banner_url: Some(public_url(Bucket::EventBanners, &format!("{id}.jpg"))),
        pdf_url: Some(public_url(Bucket::EventPdfs, &format!("{id}.pdf"))),
    })
    .await
    .expect("Failed to insert event")
}

pub async fn seed_registration(db: &Database, event_id: &str, email: &str) -> Registration {
    db.insert_registration(NewRegistration {
        event_id: event_id.to_string(),
        user_email: email.to_string(),
    })
    .await
    .expect("Failed to insert registration")
}

