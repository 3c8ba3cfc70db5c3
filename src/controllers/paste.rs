use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::models::{Paste, PasteMetadata};
use crate::storage::Storage;
use crate::words::generate_key;
use crate::App;

/// Attempts at finding an unused id before giving up.
const MAX_KEY_ATTEMPTS: usize = 8;

/// After this many collisions, ids get a numeric suffix.
const PLAIN_KEY_ATTEMPTS: usize = 4;

/// Create and store a new paste under a fresh id.
pub async fn create(app: &App, data: String, language_id: String) -> ApiResult<Paste> {
    if data.is_empty() {
        return Err(ApiError::EmptyContent);
    }
    if language_id.trim().is_empty() {
        return Err(ApiError::MissingLanguage);
    }

    let id = fresh_key(app).await?;
    let now = Utc::now();

    let paste = Paste {
        id,
        language_id,
        data,
        created_at: now,
        updated_at: now,
        expires_at: expiry_for(app, now),
    };

    info!(
        "new paste: id='{id}', language='{language}', size={size}",
        id = paste.id,
        language = paste.language_id,
        size = paste.data.len()
    );

    app.storage.save(&paste).await?;

    Ok(paste)
}

/// Get a live paste. Expired pastes are deleted on the way out and read as
/// missing.
pub async fn fetch(app: &App, id: &str) -> ApiResult<Option<Paste>> {
    let Some(paste) = app.storage.get(id).await? else {
        return Ok(None);
    };

    if paste.is_expired_at(&Utc::now()) {
        info!("deleting expired paste: {id}");
        app.storage.delete(id).await?;
        return Ok(None);
    }

    Ok(Some(paste))
}

/// Metadata of all pastes that have not expired.
pub async fn list(app: &App) -> ApiResult<Vec<PasteMetadata>> {
    let now = Utc::now();
    let pastes = app.storage.list().await?;
    Ok(pastes
        .into_iter()
        .filter(|paste| !paste.is_expired_at(&now))
        .collect())
}

pub async fn delete(app: &App, id: &str) -> ApiResult<()> {
    app.storage.delete(id).await?;
    Ok(())
}

/// Delete every expired paste, returning how many were removed.
pub async fn purge_expired(app: &App) -> ApiResult<usize> {
    let now = Utc::now();
    let pastes = app.storage.list().await?;

    let mut count = 0;
    for paste in pastes.iter().filter(|paste| paste.is_expired_at(&now)) {
        app.storage.delete(&paste.id).await?;
        count += 1;
    }

    if count > 0 {
        info!("deleted {count} expired pastes");
    }

    Ok(count)
}

fn expiry_for(app: &App, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let secs = app.config.limits.expiration_secs?;
    let lifetime = chrono::Duration::from_std(std::time::Duration::from_secs(secs)).ok()?;
    now.checked_add_signed(lifetime)
}

async fn fresh_key(app: &App) -> ApiResult<String> {
    for attempt in 0..MAX_KEY_ATTEMPTS {
        let mut key = generate_key(&app.word_lists);
        if attempt >= PLAIN_KEY_ATTEMPTS {
            key = format!("{key}-{}", thread_rng().gen_range(10..100_000));
        }

        if app.storage.get(&key).await?.is_none() {
            return Ok(key);
        }
        debug!("paste id '{key}' is taken");
    }

    Err(ApiError::NoFreeId)
}
