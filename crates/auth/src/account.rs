//! Account identity model and registration validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ucaep_core::{AccountId, DomainError, DomainResult};

use crate::Role;

/// Minimum accepted password length (in characters).
pub const MIN_PASSWORD_LEN: usize = 6;

/// Account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Account can authenticate.
    #[default]
    Active,
    /// Account is disabled by an administrator and cannot authenticate.
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(DomainError::validation(
                "status",
                format!("unknown status '{other}'"),
            )),
        }
    }
}

/// Account as seen by everything except the credential check.
///
/// The password hash is deliberately not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Normalized (trimmed, lowercase).
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}

/// Normalize an email for storage and comparison (trim + lowercase).
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_email(email: &str) -> DomainResult<()> {
    if email.is_empty() {
        return Err(DomainError::validation("email", "email is required"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("email", "invalid email format"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(DomainError::validation("email", "invalid email format"));
    };
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok {
        return Err(DomainError::validation("email", "invalid email format"));
    }
    Ok(())
}

fn validate_password(password: &str) -> DomainResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }
    Ok(())
}

fn required_name(field: &'static str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional_phone(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
}

/// Registration input (plaintext password, unvalidated).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Registration that passed validation; email is normalized.
#[derive(Clone)]
pub struct ValidRegistration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: Role,
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl core::fmt::Debug for ValidRegistration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ValidRegistration")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

impl Registration {
    /// Validate input for account creation. Missing role defaults to `producer`.
    pub fn validate(&self) -> DomainResult<ValidRegistration> {
        let email = normalize_email(&self.email);
        validate_email(&email)?;
        validate_password(&self.password)?;
        let first_name = required_name("firstName", &self.first_name)?;
        let last_name = required_name("lastName", &self.last_name)?;

        Ok(ValidRegistration {
            email,
            password: self.password.clone(),
            first_name,
            last_name,
            phone: optional_phone(self.phone.as_deref()),
            role: self.role.unwrap_or_default(),
        })
    }

    /// Validation for the public self-service endpoint: elevated roles cannot
    /// be self-assigned.
    pub fn validate_self_service(&self) -> DomainResult<ValidRegistration> {
        let valid = self.validate()?;
        if valid.role.is_elevated() {
            return Err(DomainError::validation(
                "role",
                format!("role '{}' cannot be self-assigned", valid.role),
            ));
        }
        Ok(valid)
    }
}

/// Self-service profile changes. Absent fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> DomainResult<ProfileUpdate> {
        let first_name = self
            .first_name
            .as_deref()
            .map(|v| required_name("firstName", v))
            .transpose()?;
        let last_name = self
            .last_name
            .as_deref()
            .map(|v| required_name("lastName", v))
            .transpose()?;
        Ok(ProfileUpdate {
            first_name,
            last_name,
            phone: self.phone.as_deref().map(|p| p.trim().to_string()),
        })
    }

    /// Apply onto an account. An empty phone string clears it.
    pub fn apply_to(&self, account: &mut Account, now: DateTime<Utc>) {
        if let Some(first) = &self.first_name {
            account.first_name = first.clone();
        }
        if let Some(last) = &self.last_name {
            account.last_name = last.clone();
        }
        if let Some(phone) = &self.phone {
            account.phone = optional_phone(Some(phone));
        }
        account.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: password.to_string(),
            first_name: "Alice".to_string(),
            last_name: "Martin".to_string(),
            phone: None,
            role: None,
        }
    }

    #[test]
    fn email_is_normalized() {
        let valid = registration("  Alice@X.com ", "password1").validate().unwrap();
        assert_eq!(valid.email, "alice@x.com");
        assert_eq!(valid.role, Role::Producer);
    }

    #[test]
    fn malformed_emails_are_rejected() {
        let malformed = [
            "", "alice", "alice@", "@x.com", "alice@x", "a b@x.com", "a@b@x.com", "a@.com",
        ];
        for bad in malformed {
            let err = registration(bad, "password1").validate().unwrap_err();
            assert_eq!(err.field(), Some("email"), "{bad:?}");
        }
    }

    #[test]
    fn short_password_is_rejected() {
        let err = registration("alice@x.com", "12345").validate().unwrap_err();
        assert_eq!(err.field(), Some("password"));
        assert!(registration("alice@x.com", "123456").validate().is_ok());
    }

    #[test]
    fn names_are_required() {
        let mut r = registration("alice@x.com", "password1");
        r.last_name = "   ".into();
        assert_eq!(r.validate().unwrap_err().field(), Some("lastName"));
    }

    #[test]
    fn self_service_cannot_request_elevated_role() {
        let mut r = registration("alice@x.com", "password1");
        r.role = Some(Role::Admin);
        assert_eq!(r.validate_self_service().unwrap_err().field(), Some("role"));
        assert_eq!(r.validate().unwrap().role, Role::Admin);

        r.role = Some(Role::Viewer);
        assert_eq!(r.validate_self_service().unwrap().role, Role::Viewer);
    }

    #[test]
    fn registration_reads_camel_case_json() {
        let r: Registration = serde_json::from_value(serde_json::json!({
            "email": "bob@x.com",
            "password": "secret1",
            "firstName": "Bob",
            "lastName": "Durand",
            "phone": "+212 600000000",
            "role": "viewer"
        }))
        .unwrap();
        let valid = r.validate().unwrap();
        assert_eq!(valid.role, Role::Viewer);
        assert_eq!(valid.phone.as_deref(), Some("+212 600000000"));
    }

    #[test]
    fn profile_update_applies_present_fields_only() {
        let now = Utc::now();
        let mut account = Account {
            id: AccountId::new(),
            email: "alice@x.com".into(),
            first_name: "Alice".into(),
            last_name: "Martin".into(),
            phone: Some("123".into()),
            role: Role::Producer,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let update = ProfileUpdate {
            first_name: Some(" Alicia ".into()),
            last_name: None,
            phone: Some(String::new()),
        }
        .validate()
        .unwrap();
        update.apply_to(&mut account, now);
        assert_eq!(account.first_name, "Alicia");
        assert_eq!(account.last_name, "Martin");
        assert_eq!(account.phone, None);
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", registration("alice@x.com", "hunter22"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn status_parses() {
        assert_eq!("Inactive".parse::<AccountStatus>().unwrap(), AccountStatus::Inactive);
        assert!("banned".parse::<AccountStatus>().is_err());
    }
}
