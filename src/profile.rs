use axum::{Json, extract::State};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{ProfileResponse, User},
    state::AppState,
    utils::{days_message, human_size, ru_date},
};

/// Editable profile fields. Absent and blank values leave the stored one alone.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 4, max = 64, message = "Логин должен содержать минимум 4 символа"))]
    pub login: Option<String>,
    #[validate(email(message = "Некорректный email"))]
    pub email: Option<String>,
    pub number: Option<String>,
}

impl ProfileUpdate {
    fn cleaned(self) -> Self {
        let keep = |v: Option<String>| v.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        ProfileUpdate {
            login: keep(self.login),
            email: keep(self.email),
            number: keep(self.number),
        }
    }

    /// Trim, validate and normalize; the phone comes back as its last 10 digits.
    pub fn checked(self) -> Result<Self, AppError> {
        let mut update = self.cleaned();
        update
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if let Some(login) = &update.login {
            check_login(login).map_err(|e| AppError::BadRequest(e.into()))?;
        }
        if let Some(number) = update.number.take() {
            check_phone(&number).map_err(|e| AppError::BadRequest(e.into()))?;
            update.number = Some(normalize_phone(&number));
        }
        Ok(update)
    }

    /// Merge into `user` field by field; true when anything changed.
    pub fn apply(&self, user: &mut User) -> bool {
        let mut changed = merge(&mut user.login, self.login.as_deref());
        changed |= merge(&mut user.email, self.email.as_deref());
        changed |= merge(&mut user.number, self.number.as_deref());
        changed
    }
}

fn merge(current: &mut Option<String>, incoming: Option<&str>) -> bool {
    match incoming {
        Some(value) if current.as_deref() != Some(value) => {
            *current = Some(value.to_string());
            true
        }
        _ => false,
    }
}

fn check_login(login: &str) -> Result<(), &'static str> {
    if login.chars().count() < 4 {
        return Err("Логин должен содержать минимум 4 символа");
    }
    if !login
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Логин может содержать только латинские буквы, цифры и знак подчёркивания");
    }
    Ok(())
}

/// Russian mobile number as typed by a person: `+7 (912) 345-67-89`, `89123456789`...
pub fn check_phone(phone: &str) -> Result<(), &'static str> {
    let phone = phone.trim();
    let cleaned: String = phone
        .chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '(' | ')' | '-' | '–')))
        .collect();

    let expected_len = if cleaned.starts_with("+7") {
        12
    } else if cleaned.starts_with('8') {
        11
    } else {
        return Err("Номер должен начинаться с +7 или 8");
    };
    if cleaned.chars().count() != expected_len {
        return Err("Неверная длина номера");
    }
    if !cleaned.trim_start_matches('+').chars().all(|c| c.is_ascii_digit()) {
        return Err("Номер содержит недопустимые символы");
    }
    if phone.contains("--") {
        return Err("Не допускается два дефиса подряд");
    }
    if phone.starts_with('-') || phone.ends_with('-') {
        return Err("Номер не может начинаться или заканчиваться дефисом");
    }
    if phone.matches('(').count() != phone.matches(')').count() {
        return Err("Количество открывающих и закрывающих скобок должно совпадать");
    }
    if phone.contains('(') && !has_area_code(phone) {
        return Err("Скобки должны окружать ровно три цифры");
    }
    Ok(())
}

/// Some `(ddd)` group somewhere in `phone`.
fn has_area_code(phone: &str) -> bool {
    phone.as_bytes().windows(5).any(|w| {
        w[0] == b'(' && w[4] == b')' && w[1..4].iter().all(u8::is_ascii_digit)
    })
}

pub fn normalize_phone(phone: &str) -> String {
    let digits: Vec<char> = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let start = digits.len().saturating_sub(10);
    digits[start..].iter().collect()
}

async fn statistics(state: &AppState, user: User) -> Result<ProfileResponse, AppError> {
    let photos = state.catalog.count_photos(user.id).await?;
    let quota = state.config.storage_quota_bytes;
    let used = user.used_space.max(0) as u64;
    let used_percent = if quota == 0 {
        0.0
    } else {
        (used as f64 / quota as f64 * 1000.0).round() / 10.0
    };
    let days = (Utc::now().date_naive() - user.date_of_registration).num_days().max(0);

    Ok(ProfileResponse {
        login: user.login,
        email: user.email,
        number: user.number,
        photos,
        used_space: human_size(used),
        quota: human_size(quota),
        used_percent,
        registered: ru_date(user.date_of_registration),
        days_message: days_message(days),
    })
}

/// Account statistics of the caller.
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let account = state.catalog.find_user(user.user_id).await?;
    Ok(Json(statistics(&state, account).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    let update = update.checked()?;
    let mut account = state.catalog.find_user(user.user_id).await?;

    if update.apply(&mut account) {
        state.catalog.update_profile(&account).await?;
        info!("Profile updated (user {})", user.user_id);
    }

    Ok(Json(statistics(&state, account).await?))
}
