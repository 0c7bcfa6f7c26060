use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use rand_core::{OsRng, RngCore};

use crate::errors::AppError;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Password rules mirrored from the account-activation flow: 8+ chars, one
/// digit, one lowercase, one uppercase, one special character. Returns every
/// violated rule so the client can show all of them at once.
pub fn validate_password(password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.len() < 8 {
        errors.push("A senha precisa ter pelo menos 8 caracteres.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("A senha precisa ter pelo menos 1 número.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("A senha precisa ter pelo menos 1 letra minúscula.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("A senha precisa ter pelo menos 1 letra maiúscula.".to_string());
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push("A senha precisa ter 1 caractere especial.".to_string());
    }

    errors
}

/// 5-digit mission code for account activation sessions.
pub fn mission_code() -> String {
    let mut bytes = [0u8; 4];
    OsRng.fill_bytes(&mut bytes);
    format!("{:05}", u32::from_be_bytes(bytes) % 100_000)
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// The organization's calendar offset. Daily bonus caps and date searches are
/// evaluated against this clock, not the server's.
pub fn org_offset() -> FixedOffset {
    let hours = std::env::var("ORG_UTC_OFFSET_HOURS")
        .ok()
        .and_then(|value| value.parse::<i32>().ok())
        .unwrap_or(-3);

    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// Start of the current local calendar day, as a UTC instant.
pub fn start_of_today() -> DateTime<Utc> {
    let offset = org_offset();
    let local_date = Utc::now().with_timezone(&offset).date_naive();
    day_start_utc(local_date, offset)
}

/// Start of the current local week (Monday), as a UTC instant.
pub fn start_of_week() -> DateTime<Utc> {
    let offset = org_offset();
    let local_date = Utc::now().with_timezone(&offset).date_naive();
    let monday = local_date - Duration::days(local_date.weekday().num_days_from_monday() as i64);
    day_start_utc(monday, offset)
}

/// UTC window [start, end) covering one local calendar day.
pub fn local_day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let offset = org_offset();
    let begin = day_start_utc(date, offset);
    (begin, begin + Duration::days(1))
}

fn day_start_utc(date: NaiveDate, offset: FixedOffset) -> DateTime<Utc> {
    offset
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"))
        .single()
        .expect("fixed offsets have no DST gaps")
        .with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules_collect_all_violations() {
        let errors = validate_password("abc");
        assert_eq!(errors.len(), 4);

        assert!(validate_password("S3cure!pwd").is_empty());
    }

    #[test]
    fn mission_code_is_five_digits() {
        let code = mission_code();
        assert_eq!(code.len(), 5);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn day_bounds_span_24_hours() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let (begin, end) = local_day_bounds(date);
        assert_eq!(end - begin, Duration::days(1));
    }
}
