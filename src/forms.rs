//! Submitted forms.
//!
//! Each form deserializes from a url-encoded body with every field optional, so a missing field
//! is reported as a validation error instead of a decoding failure. Password fields are never
//! serialized back into a re-rendered page.

use crate::validator::{self, Validator, EMAIL_RX};
use serde::{Deserialize, Serialize};

const BLANK: &str = "This field cannot be blank";
const EXPIRY_DAYS: [u32; 3] = [1, 7, 365];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetCreateForm {
    pub title: String,
    pub content: String,
    /// Days until expiry, as submitted.
    pub expires: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl SnippetCreateForm {
    /// Empty form with the longest expiry preselected.
    pub fn blank() -> Self {
        Self {
            expires: "365".to_string(),
            ..Self::default()
        }
    }

    /// Validate and return the expiry in days.
    pub fn validate(&mut self) -> Option<u32> {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.title), "title", BLANK);
        v.check_field(
            validator::max_chars(&self.title, 100),
            "title",
            "This field cannot be more than 100 characters long",
        );
        v.check_field(validator::not_blank(&self.content), "content", BLANK);

        let expires = self.expires.trim().parse::<u32>().ok();
        v.check_field(
            expires.is_some_and(|days| validator::permitted_value(&days, &EXPIRY_DAYS)),
            "expires",
            "This field must equal 1, 7 or 365",
        );

        expires.filter(|_| v.valid())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSignupForm {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserSignupForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.name), "name", BLANK);
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.check_field(
            validator::min_chars(&self.password, 8),
            "password",
            "This field must be at least 8 characters long",
        );
        v.valid()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserLoginForm {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl UserLoginForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(validator::not_blank(&self.email), "email", BLANK);
        v.check_field(
            validator::matches(&self.email, &EMAIL_RX),
            "email",
            "This field must be a valid email address",
        );
        v.check_field(validator::not_blank(&self.password), "password", BLANK);
        v.valid()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordUpdateForm {
    #[serde(skip_serializing)]
    pub current_password: String,
    #[serde(skip_serializing)]
    pub new_password: String,
    #[serde(skip_serializing)]
    pub new_password_confirmation: String,
    #[serde(skip_deserializing)]
    pub validator: Validator,
}

impl PasswordUpdateForm {
    pub fn validate(&mut self) -> bool {
        let v = &mut self.validator;
        v.check_field(
            validator::not_blank(&self.current_password),
            "currentPassword",
            BLANK,
        );
        v.check_field(validator::not_blank(&self.new_password), "newPassword", BLANK);
        v.check_field(
            validator::min_chars(&self.new_password, 8),
            "newPassword",
            "This field must be at least 8 characters long",
        );
        v.check_field(
            validator::not_blank(&self.new_password_confirmation),
            "newPasswordConfirmation",
            BLANK,
        );
        v.check_field(
            validator::equal(
                self.new_password.as_str(),
                self.new_password_confirmation.as_str(),
            ),
            "newPasswordConfirmation",
            "Passwords do not match",
        );
        v.valid()
    }
}
