use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::AppError;

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MIN_PASSWORD_LEN: usize = 6;

/// Full identity record as stored. The password hash never leaves the server;
/// responses use [`UserProfile`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Baja,
    #[default]
    Media,
    Alta,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Baja => "baja",
            Priority::Media => "media",
            Priority::Alta => "alta",
        }
    }

    pub fn parse(raw: &str) -> Option<Priority> {
        match raw {
            "baja" => Some(Priority::Baja),
            "media" => Some(Priority::Media),
            "alta" => Some(Priority::Alta),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due_date: Option<String>,
    pub priority: Priority,
    #[serde(rename = "user")]
    pub user_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn cleaned(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.is_empty() {
            return Err(AppError::Validation("name is required".into()));
        }
        if char_len(&self.name) > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "name cannot be longer than {MAX_NAME_LEN} characters"
            )));
        }
        if self.email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if !valid_email(&self.email) {
            return Err(AppError::Validation("email must be valid".into()));
        }
        if char_len(&self.password) < MIN_PASSWORD_LEN {
            return Err(AppError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.is_empty() {
            return Err(AppError::Validation("email is required".into()));
        }
        if !valid_email(&self.email) {
            return Err(AppError::Validation("email must be valid".into()));
        }
        if self.password.is_empty() {
            return Err(AppError::Validation("password is required".into()));
        }
        Ok(())
    }
}

/// Creation payload. An owner field a client sends is simply not part of this
/// struct; ownership always comes from the authenticated identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

impl CreateTask {
    pub fn cleaned(mut self) -> Self {
        self.title = self.title.trim().to_string();
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(Some(self.title.as_str()))?;
        validate_description(self.description.as_deref())?;
        validate_due_date(self.due_date.as_deref())
    }
}

/// Update payload; only these allow-listed fields can change, each re-checked
/// against the same bounds as creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<String>,
}

impl UpdateTask {
    pub fn cleaned(mut self) -> Self {
        self.title = self.title.map(|t| t.trim().to_string());
        self.description = self.description.map(|d| d.trim().to_string());
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_title(self.title.as_deref())?;
        validate_description(self.description.as_deref())?;
        validate_due_date(self.due_date.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub completed: Option<bool>,
    pub priority: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    DueDate,
    Priority,
    Title,
}

impl SortColumn {
    pub fn column(self) -> &'static str {
        match self {
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::DueDate => "due_date",
            SortColumn::Priority => "priority",
            SortColumn::Title => "title",
        }
    }

    fn parse(raw: &str) -> Option<SortColumn> {
        match raw {
            "createdAt" => Some(SortColumn::CreatedAt),
            "updatedAt" => Some(SortColumn::UpdatedAt),
            "dueDate" => Some(SortColumn::DueDate),
            "priority" => Some(SortColumn::Priority),
            "title" => Some(SortColumn::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSort {
    pub column: SortColumn,
    pub descending: bool,
}

impl TaskSort {
    /// ORDER BY fragment. Safe to interpolate: column names come from the
    /// fixed allow-list, never from client input.
    pub fn sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!("{} {}", self.column.column(), direction)
    }
}

/// Parses a comma-separated sort expression (`-createdAt,title`), rejecting
/// any key outside the sortable-field allow-list.
pub fn parse_sort(raw: &str) -> Result<Vec<TaskSort>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            let (field, descending) = match key.strip_prefix('-') {
                Some(field) => (field, true),
                None => (key, false),
            };
            match SortColumn::parse(field) {
                Some(column) => Ok(TaskSort { column, descending }),
                None => Err(AppError::Validation(format!("unknown sort field: {field}"))),
            }
        })
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@')
}

fn validate_title(title: Option<&str>) -> Result<(), AppError> {
    let Some(title) = title else { return Ok(()) };
    if title.is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    if char_len(title) > MAX_TITLE_LEN {
        return Err(AppError::Validation(format!(
            "title cannot be longer than {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), AppError> {
    if let Some(description) = description {
        if char_len(description) > MAX_DESCRIPTION_LEN {
            return Err(AppError::Validation(format!(
                "description cannot be longer than {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }
    Ok(())
}

fn validate_due_date(due_date: Option<&str>) -> Result<(), AppError> {
    let Some(raw) = due_date else { return Ok(()) };
    let date_only = format_description!("[year]-[month]-[day]");
    if OffsetDateTime::parse(raw, &Rfc3339).is_err() && Date::parse(raw, &date_only).is_err() {
        return Err(AppError::Validation("dueDate must be a valid date".into()));
    }
    Ok(())
}
