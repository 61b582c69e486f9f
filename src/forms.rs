use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::user::UserPatch;
use crate::validation::{
    digits_only, parse_birth_date, remove_emojis, validate_birth_date, validate_confirm_password,
    validate_diary_text, validate_email, validate_gender, validate_name, validate_password,
    validate_phone, validate_title, BirthDateRule, FieldError, BIRTH_DATE_DIGITS,
    PHONE_MAX_DIGITS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Email,
    Password,
    ConfirmPassword,
    Name,
    BirthDate,
    Phone,
    Gender,
}

impl Field {
    pub const CREDENTIALS: [Field; 3] = [Field::Email, Field::Password, Field::ConfirmPassword];
    pub const PROFILE: [Field; 4] = [Field::Name, Field::BirthDate, Field::Phone, Field::Gender];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Email => "email",
            Field::Password => "password",
            Field::ConfirmPassword => "confirmPassword",
            Field::Name => "name",
            Field::BirthDate => "birthDate",
            Field::Phone => "phone",
            Field::Gender => "gender",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Field::Email),
            "password" => Ok(Field::Password),
            "confirmPassword" | "confirm-password" => Ok(Field::ConfirmPassword),
            "name" => Ok(Field::Name),
            "birthDate" | "birth-date" => Ok(Field::BirthDate),
            "phone" => Ok(Field::Phone),
            "gender" => Ok(Field::Gender),
            other => Err(format!("unknown field: {other}")),
        }
    }
}

/// Inline message per field. A missing or empty entry means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors(BTreeMap<Field, String>);

impl FormErrors {
    pub fn get(&self, field: Field) -> &str {
        self.0.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, field: Field, result: Result<(), FieldError>) {
        self.0.insert(field, crate::validation::message(result));
    }

    pub fn clear(&mut self, field: Field) {
        self.0.insert(field, String::new());
    }

    pub fn is_valid(&self) -> bool {
        self.0.values().all(String::is_empty)
    }

    /// Fields that currently carry a message.
    pub fn failing(&self) -> impl Iterator<Item = (Field, &str)> {
        self.0
            .iter()
            .filter(|(_, msg)| !msg.is_empty())
            .map(|(field, msg)| (*field, msg.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchedFields(BTreeSet<Field>);

impl TouchedFields {
    pub fn touch(&mut self, field: Field) {
        self.0.insert(field);
    }

    pub fn is_touched(&self, field: Field) -> bool {
        self.0.contains(&field)
    }
}

fn collect_errors(checks: &[(Field, Result<(), FieldError>)]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    for (field, result) in checks {
        if let Err(e) = result {
            errors.add(field.as_str(), e.to_validation_error());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ============================================================================
// Signup
// ============================================================================

/// Raw signup input. Phone and birth date hold digits only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub phone: String,
    pub birth_date: String,
    pub gender: String,
}

impl SignupForm {
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Email => &self.email,
            Field::Password => &self.password,
            Field::ConfirmPassword => &self.confirm_password,
            Field::Name => &self.name,
            Field::BirthDate => &self.birth_date,
            Field::Phone => &self.phone,
            Field::Gender => &self.gender,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Email => &mut self.email,
            Field::Password => &mut self.password,
            Field::ConfirmPassword => &mut self.confirm_password,
            Field::Name => &mut self.name,
            Field::BirthDate => &mut self.birth_date,
            Field::Phone => &mut self.phone,
            Field::Gender => &mut self.gender,
        }
    }

    pub fn check(&self, field: Field, rule: BirthDateRule) -> Result<(), FieldError> {
        match field {
            Field::Email => validate_email(&self.email),
            Field::Password => validate_password(&self.password),
            Field::ConfirmPassword => validate_confirm_password(&self.confirm_password, &self.password),
            Field::Name => validate_name(&self.name),
            Field::BirthDate => validate_birth_date(&self.birth_date, rule),
            Field::Phone => validate_phone(&self.phone),
            Field::Gender => validate_gender(&self.gender),
        }
    }

    pub fn credentials(&self) -> CredentialsStep<'_> {
        CredentialsStep { form: self }
    }

    pub fn profile(&self, rule: BirthDateRule) -> ProfileStep<'_> {
        ProfileStep { form: self, rule }
    }
}

/// First signup step: email and password.
pub struct CredentialsStep<'a> {
    form: &'a SignupForm,
}

impl Validate for CredentialsStep<'_> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let checks: Vec<_> = Field::CREDENTIALS
            .iter()
            .map(|f| (*f, self.form.check(*f, BirthDateRule::default())))
            .collect();
        collect_errors(&checks)
    }
}

/// Second signup step: personal details.
pub struct ProfileStep<'a> {
    form: &'a SignupForm,
    rule: BirthDateRule,
}

impl Validate for ProfileStep<'_> {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let checks: Vec<_> = Field::PROFILE
            .iter()
            .map(|f| (*f, self.form.check(*f, self.rule)))
            .collect();
        collect_errors(&checks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupStep {
    Credentials,
    Profile,
    Completed,
}

/// Where the back action leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupBack {
    ToCredentials,
    ToLogin,
}

/// The record handed to the caller when signup completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignupRecord {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
    pub phone: String,
    pub birth_date: String,
    pub gender: String,
}

#[derive(Debug, Clone)]
pub struct SignupFlow {
    form: SignupForm,
    errors: FormErrors,
    touched: TouchedFields,
    step: SignupStep,
    rule: BirthDateRule,
}

impl SignupFlow {
    pub fn new(rule: BirthDateRule) -> Self {
        Self {
            form: SignupForm::default(),
            errors: FormErrors::default(),
            touched: TouchedFields::default(),
            step: SignupStep::Credentials,
            rule,
        }
    }

    pub fn form(&self) -> &SignupForm {
        &self.form
    }

    pub fn errors(&self) -> &FormErrors {
        &self.errors
    }

    pub fn touched(&self) -> &TouchedFields {
        &self.touched
    }

    pub fn step(&self) -> SignupStep {
        self.step
    }

    /// Store typed input. Emojis are dropped, phone and birth date keep
    /// their digits only, and a pending error on the field is cleared.
    pub fn set_field(&mut self, field: Field, value: &str) {
        let sanitized = remove_emojis(value);
        let sanitized = match field {
            Field::Phone => digits_only(&sanitized).chars().take(PHONE_MAX_DIGITS).collect(),
            Field::BirthDate => digits_only(&sanitized).chars().take(BIRTH_DATE_DIGITS).collect(),
            _ => sanitized,
        };
        *self.form.value_mut(field) = sanitized;

        if !self.errors.get(field).is_empty() {
            self.errors.clear(field);
        }
    }

    /// Mark the field touched and validate it.
    pub fn blur(&mut self, field: Field) {
        self.touched.touch(field);

        if field == Field::BirthDate && self.form.birth_date.len() == BIRTH_DATE_DIGITS {
            let out_of_range = matches!(
                parse_birth_date(&self.form.birth_date, BirthDateRule::default()),
                Err(FieldError::BirthDayOutOfRange
                    | FieldError::BirthMonthOutOfRange
                    | FieldError::BirthYearTooEarly)
            );
            if out_of_range {
                self.form.birth_date.clear();
            }
        }

        if field == Field::Password && self.touched.is_touched(Field::ConfirmPassword) {
            self.errors.set(
                Field::ConfirmPassword,
                self.form.check(Field::ConfirmPassword, self.rule),
            );
        }

        self.errors.set(field, self.form.check(field, self.rule));
    }

    fn validate_fields(&mut self, fields: &[Field]) -> bool {
        for field in fields {
            self.errors.set(*field, self.form.check(*field, self.rule));
        }
        fields.iter().all(|f| self.errors.get(*f).is_empty())
    }

    /// Move from credentials to profile when every credential field passes.
    pub fn proceed(&mut self) -> bool {
        if self.step != SignupStep::Credentials {
            return false;
        }
        if !self.validate_fields(&Field::CREDENTIALS) {
            return false;
        }
        self.step = SignupStep::Profile;
        true
    }

    pub fn back(&mut self) -> SignupBack {
        match self.step {
            SignupStep::Profile => {
                self.step = SignupStep::Credentials;
                SignupBack::ToCredentials
            }
            _ => SignupBack::ToLogin,
        }
    }

    /// Finish the flow when every profile field passes.
    pub fn submit(&mut self) -> Option<SignupRecord> {
        if self.step != SignupStep::Profile || !self.validate_fields(&Field::PROFILE) {
            return None;
        }
        self.step = SignupStep::Completed;
        tracing::info!(email = %self.form.email, "Signup form completed");

        Some(SignupRecord {
            email: self.form.email.clone(),
            password: self.form.password.clone(),
            name: self.form.name.clone(),
            phone: self.form.phone.clone(),
            birth_date: self.form.birth_date.clone(),
            gender: self.form.gender.clone(),
        })
    }
}

// ============================================================================
// Profile edit
// ============================================================================

/// Profile edit input. Empty fields are left unchanged and not validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileEditForm {
    pub nome: String,
    /// `DDMMYYYY` digits.
    pub data_nascimento: String,
    pub telefone: String,
    pub genero: String,
}

impl ProfileEditForm {
    pub fn validate_with(&self, rule: BirthDateRule) -> FormErrors {
        let mut errors = FormErrors::default();
        if !self.nome.trim().is_empty() {
            errors.set(Field::Name, validate_name(self.nome.trim()));
        }
        if !self.data_nascimento.is_empty() {
            errors.set(
                Field::BirthDate,
                validate_birth_date(&digits_only(&self.data_nascimento), rule),
            );
        }
        if !self.telefone.is_empty() {
            errors.set(Field::Phone, validate_phone(&self.telefone));
        }
        errors
    }

    /// The patch to send, or the errors that prevent it.
    pub fn to_patch(&self, rule: BirthDateRule) -> Result<UserPatch, FormErrors> {
        let errors = self.validate_with(rule);
        if !errors.is_valid() {
            return Err(errors);
        }

        let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        let data_nascimento = match digits_only(&self.data_nascimento).as_str() {
            "" => None,
            digits => parse_birth_date(digits, rule)
                .ok()
                .map(|d| d.format("%Y-%m-%d").to_string()),
        };

        Ok(UserPatch {
            nome: non_empty(self.nome.as_str()),
            data_nascimento,
            telefone: non_empty(digits_only(&self.telefone).as_str()),
            genero: non_empty(self.genero.as_str()),
            ..Default::default()
        })
    }
}

// ============================================================================
// Diary compose
// ============================================================================

fn title_rule(title: &str) -> Result<(), ValidationError> {
    validate_title(title).map_err(|e| e.to_validation_error())
}

fn text_rule(text: &str) -> Result<(), ValidationError> {
    validate_diary_text(text).map_err(|e| e.to_validation_error())
}

#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct DiaryDraft {
    #[validate(custom = "title_rule")]
    pub title: String,
    #[validate(custom = "text_rule")]
    pub text: String,
}

impl DiaryDraft {
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
        }
    }

    /// The single message the compose modal shows: title first, then text.
    pub fn check(&self) -> Result<(), FieldError> {
        validate_title(&self.title)?;
        validate_diary_text(&self.text)
    }

    /// Submit stays disabled until both fields hold something.
    pub fn can_submit(&self) -> bool {
        !self.title.is_empty() && !self.text.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_credentials(flow: &mut SignupFlow) {
        flow.set_field(Field::Email, "ana@gmail.com");
        flow.set_field(Field::Password, "Abcdef1!");
        flow.set_field(Field::ConfirmPassword, "Abcdef1!");
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in Field::CREDENTIALS.iter().chain(Field::PROFILE.iter()) {
            assert_eq!(field.as_str().parse::<Field>().unwrap(), *field);
        }
        assert!("idade".parse::<Field>().is_err());
    }

    #[test]
    fn test_proceed_requires_valid_credentials() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        flow.set_field(Field::Email, "ana@unknown.com");
        flow.set_field(Field::Password, "abc12345");

        assert!(!flow.proceed());
        assert_eq!(flow.step(), SignupStep::Credentials);
        assert_eq!(
            flow.errors().get(Field::Email),
            "Use um email válido (Gmail, Hotmail, Outlook, etc.)"
        );
        assert!(!flow.errors().get(Field::Password).is_empty());
        assert_eq!(
            flow.errors().get(Field::ConfirmPassword),
            "Confirmação de senha é obrigatória"
        );

        filled_credentials(&mut flow);
        assert!(flow.proceed());
        assert_eq!(flow.step(), SignupStep::Profile);
        assert!(flow.errors().is_valid());
    }

    #[test]
    fn test_typing_clears_field_error() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        flow.blur(Field::Email);
        assert_eq!(flow.errors().get(Field::Email), "Email é obrigatório");
        assert!(flow.touched().is_touched(Field::Email));

        flow.set_field(Field::Email, "a");
        assert_eq!(flow.errors().get(Field::Email), "");
    }

    #[test]
    fn test_password_blur_revalidates_touched_confirmation() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        flow.set_field(Field::Password, "Abcdef1!");
        flow.set_field(Field::ConfirmPassword, "Abcdef1!");
        flow.blur(Field::ConfirmPassword);
        assert_eq!(flow.errors().get(Field::ConfirmPassword), "");

        flow.set_field(Field::Password, "Abcdef2!");
        flow.blur(Field::Password);
        assert_eq!(flow.errors().get(Field::ConfirmPassword), "Senhas não coincidem");
    }

    #[test]
    fn test_inputs_are_sanitized() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        flow.set_field(Field::Name, "Ana 😀");
        flow.set_field(Field::Phone, "(11) 98765-43210");
        flow.set_field(Field::BirthDate, "01/01/1980 extra 99");

        assert_eq!(flow.form().name, "Ana ");
        assert_eq!(flow.form().phone, "11987654321");
        assert_eq!(flow.form().birth_date, "01011980");
    }

    #[test]
    fn test_out_of_range_birth_date_cleared_on_blur() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        flow.set_field(Field::BirthDate, "32011990");
        flow.blur(Field::BirthDate);

        assert_eq!(flow.form().birth_date, "");
        assert_eq!(flow.errors().get(Field::BirthDate), "Data de nascimento é obrigatória");
    }

    #[test]
    fn test_back_and_submit() {
        let mut flow = SignupFlow::new(BirthDateRule::default());
        assert_eq!(flow.back(), SignupBack::ToLogin);
        assert!(flow.submit().is_none());

        filled_credentials(&mut flow);
        assert!(flow.proceed());
        assert_eq!(flow.back(), SignupBack::ToCredentials);
        assert_eq!(flow.step(), SignupStep::Credentials);
        assert!(flow.proceed());

        assert!(flow.submit().is_none());
        assert_eq!(flow.errors().get(Field::Gender), "Gênero é obrigatório");

        flow.set_field(Field::Name, "Ana Clara");
        flow.set_field(Field::BirthDate, "01011980");
        flow.set_field(Field::Phone, "11987654321");
        flow.set_field(Field::Gender, "feminino");

        let record = flow.submit().unwrap();
        assert_eq!(flow.step(), SignupStep::Completed);
        assert_eq!(record.email, "ana@gmail.com");
        assert_eq!(record.birth_date, "01011980");
        assert!(flow.submit().is_none());

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_steps_implement_validate() {
        let mut form = SignupForm {
            email: "12345@gmail.com".into(),
            password: "Abcdef1!".into(),
            confirm_password: "Abcdef1!".into(),
            ..Default::default()
        };

        let errors = form.credentials().validate().unwrap_err();
        let fields = errors.field_errors();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["email"][0].code, "invalid");

        form.email = "ana@gmail.com".into();
        assert!(form.credentials().validate().is_ok());

        let errors = form.profile(BirthDateRule::default()).validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 4);
    }

    #[test]
    fn test_profile_edit_patch() {
        let form = ProfileEditForm {
            nome: "Ana Clara".into(),
            data_nascimento: "15/03/1990".into(),
            telefone: "(21) 3456-7890".into(),
            genero: String::new(),
        };

        let patch = form.to_patch(BirthDateRule::default()).unwrap();
        assert_eq!(patch.nome.as_deref(), Some("Ana Clara"));
        assert_eq!(patch.data_nascimento.as_deref(), Some("1990-03-15"));
        assert_eq!(patch.telefone.as_deref(), Some("2134567890"));
        assert_eq!(patch.genero, None);

        let empty = ProfileEditForm::default();
        assert!(empty.to_patch(BirthDateRule::default()).unwrap().is_empty());
    }

    #[test]
    fn test_profile_edit_rejects_invalid_phone() {
        let form = ProfileEditForm {
            telefone: "0912345678".into(),
            ..Default::default()
        };
        let errors = form.to_patch(BirthDateRule::default()).unwrap_err();
        assert_eq!(errors.get(Field::Phone), "DDD inválido");
        assert_eq!(errors.failing().count(), 1);
    }

    #[test]
    fn test_diary_draft_checks_title_before_text() {
        assert_eq!(DiaryDraft::new("", "").check(), Err(FieldError::TitleRequired));
        assert_eq!(DiaryDraft::new("Hoje ☀", "x").check(), Err(FieldError::TitleHasEmoji));
        assert_eq!(DiaryDraft::new("Hoje", "   ").check(), Err(FieldError::TextRequired));
        assert!(DiaryDraft::new("Hoje", "Dia bom").check().is_ok());

        assert!(!DiaryDraft::new("Hoje", " ").can_submit());
        assert!(DiaryDraft::new("Hoje", "ok").validate().is_ok());
        let errors = DiaryDraft::new("x".repeat(31), "ok").validate().unwrap_err();
        assert_eq!(errors.field_errors()["title"][0].code, "too_long");
    }
}
