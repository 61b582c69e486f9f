use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, Local, Months, NaiveDate};
use regex::Regex;
use validator::ValidationError;

pub const EMAIL_MAX_LEN: usize = 254;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";
pub const NAME_MIN_LEN: usize = 2;
pub const TITLE_MAX_LEN: usize = 30;
pub const PHONE_MIN_DIGITS: usize = 10;
pub const PHONE_MAX_DIGITS: usize = 11;
pub const BIRTH_DATE_DIGITS: usize = 8;
pub const OLDEST_AGE_YEARS: u32 = 120;
pub const EARLIEST_BIRTH_YEAR: i32 = 1900;

const EMAIL_FORBIDDEN_CHARS: &[char] = &[',', ';', '<', '>', '(', ')', '[', ']', '{', '}'];

/// Providers accepted in the domain part, followed by a TLD of two or more letters.
const EMAIL_PROVIDERS: &[&str] = &[
    "gmail", "hotmail", "outlook", "yahoo", "icloud", "protonmail", "live", "aol", "zoho",
    "yandex", "mail",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Email é obrigatório")]
    EmailRequired,
    #[error("Email muito longo")]
    EmailTooLong,
    #[error("Email não pode conter espaços")]
    EmailHasWhitespace,
    #[error("Email contém caracteres inválidos")]
    EmailForbiddenChars,
    #[error("Email inválido")]
    EmailInvalid,
    #[error("Nome do email não pode ser apenas números")]
    EmailNumericLocalPart,
    #[error("Use um email válido (Gmail, Hotmail, Outlook, etc.)")]
    EmailDomainNotAllowed,

    #[error("Senha é obrigatória")]
    PasswordRequired,
    #[error("Senha deve ter pelo menos 8 caracteres")]
    PasswordTooShort,
    #[error("Senha deve conter pelo menos uma letra maiúscula")]
    PasswordMissingUppercase,
    #[error("Senha deve conter pelo menos uma letra minúscula")]
    PasswordMissingLowercase,
    #[error("Senha deve conter pelo menos um número")]
    PasswordMissingDigit,
    #[error("Senha deve conter pelo menos um caractere especial")]
    PasswordMissingSpecial,

    #[error("Confirmação de senha é obrigatória")]
    ConfirmPasswordRequired,
    #[error("Senhas não coincidem")]
    PasswordMismatch,

    #[error("Nome é obrigatório")]
    NameRequired,
    #[error("Nome deve ter pelo menos 2 caracteres")]
    NameTooShort,
    #[error("Nome deve conter apenas letras")]
    NameInvalidChars,

    #[error("Data de nascimento é obrigatória")]
    BirthDateRequired,
    #[error("Data de nascimento inválida")]
    BirthDateInvalid,
    #[error("Dia inválido")]
    BirthDayOutOfRange,
    #[error("Mês inválido")]
    BirthMonthOutOfRange,
    #[error("Ano inválido")]
    BirthYearTooEarly,
    #[error("Você deve ter pelo menos {0} anos")]
    Underage(u32),
    #[error("Somente para maiores de 12 anos")]
    BornAfterCutoff,

    #[error("Telefone é obrigatório")]
    PhoneRequired,
    #[error("Telefone deve ter pelo menos 10 dígitos")]
    PhoneTooShort,
    #[error("Telefone deve ter no máximo 11 dígitos")]
    PhoneTooLong,
    #[error("DDD inválido")]
    PhoneInvalidAreaCode,

    #[error("Gênero é obrigatório")]
    GenderRequired,

    #[error("Título é obrigatório")]
    TitleRequired,
    #[error("O título não pode conter emoji")]
    TitleHasEmoji,
    #[error("Título muito longo (máximo 30 caracteres)")]
    TitleTooLong,

    #[error("Texto é obrigatório")]
    TextRequired,
}

impl FieldError {
    /// Stable machine code, used as the `validator` error code.
    pub fn code(&self) -> &'static str {
        match self {
            FieldError::EmailRequired
            | FieldError::PasswordRequired
            | FieldError::ConfirmPasswordRequired
            | FieldError::NameRequired
            | FieldError::BirthDateRequired
            | FieldError::PhoneRequired
            | FieldError::GenderRequired
            | FieldError::TitleRequired
            | FieldError::TextRequired => "required",
            FieldError::EmailTooLong | FieldError::TitleTooLong | FieldError::PhoneTooLong => {
                "too_long"
            }
            FieldError::PasswordTooShort | FieldError::NameTooShort | FieldError::PhoneTooShort => {
                "too_short"
            }
            FieldError::EmailDomainNotAllowed => "domain_not_allowed",
            FieldError::PasswordMismatch => "mismatch",
            FieldError::Underage(_) | FieldError::BornAfterCutoff => "underage",
            _ => "invalid",
        }
    }

    pub fn to_validation_error(&self) -> ValidationError {
        let mut err = ValidationError::new(self.code());
        err.message = Some(Cow::Owned(self.to_string()));
        err
    }
}

/// Collapse a validator result into the inline message; empty means valid.
pub fn message(result: Result<(), FieldError>) -> String {
    match result {
        Ok(()) => String::new(),
        Err(e) => e.to_string(),
    }
}

// ============================================================================
// Email
// ============================================================================

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)*$")
            .expect("email pattern compiles")
    })
}

fn email_domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let providers = EMAIL_PROVIDERS.join("|");
        Regex::new(&format!(r"(?i)^(?:{providers})\.[a-z]{{2,}}$"))
            .expect("email domain pattern compiles")
    })
}

pub fn validate_email(email: &str) -> Result<(), FieldError> {
    if email.is_empty() {
        return Err(FieldError::EmailRequired);
    }

    let trimmed = email.trim();
    if trimmed.is_empty() {
        return Err(FieldError::EmailRequired);
    }
    if trimmed.chars().count() > EMAIL_MAX_LEN {
        return Err(FieldError::EmailTooLong);
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(FieldError::EmailHasWhitespace);
    }
    if trimmed.contains(EMAIL_FORBIDDEN_CHARS) {
        return Err(FieldError::EmailForbiddenChars);
    }
    if trimmed.starts_with(['.', '@']) || trimmed.ends_with(['.', '@']) {
        return Err(FieldError::EmailInvalid);
    }
    if trimmed.contains("..") || trimmed.contains("@@") {
        return Err(FieldError::EmailInvalid);
    }
    if trimmed.matches('@').count() != 1 {
        return Err(FieldError::EmailInvalid);
    }
    if !email_pattern().is_match(trimmed) {
        return Err(FieldError::EmailInvalid);
    }

    let (local, domain) = trimmed.split_once('@').ok_or(FieldError::EmailInvalid)?;
    if local.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::EmailNumericLocalPart);
    }

    for label in domain.split('.') {
        if label.chars().count() < 2 || label.starts_with('-') || label.ends_with('-') {
            return Err(FieldError::EmailInvalid);
        }
    }

    if !email_domain_pattern().is_match(domain) {
        return Err(FieldError::EmailDomainNotAllowed);
    }

    Ok(())
}

// ============================================================================
// Password
// ============================================================================

pub fn validate_password(password: &str) -> Result<(), FieldError> {
    if password.is_empty() {
        return Err(FieldError::PasswordRequired);
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(FieldError::PasswordTooShort);
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(FieldError::PasswordMissingUppercase);
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(FieldError::PasswordMissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(FieldError::PasswordMissingDigit);
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(FieldError::PasswordMissingSpecial);
    }
    Ok(())
}

pub fn validate_confirm_password(confirm: &str, password: &str) -> Result<(), FieldError> {
    if confirm.is_empty() {
        return Err(FieldError::ConfirmPasswordRequired);
    }
    if confirm != password {
        return Err(FieldError::PasswordMismatch);
    }
    Ok(())
}

// ============================================================================
// Profile fields
// ============================================================================

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z\x{00C0}-\x{00FF}\s]+$").expect("name pattern compiles")
    })
}

pub fn validate_name(name: &str) -> Result<(), FieldError> {
    if name.is_empty() {
        return Err(FieldError::NameRequired);
    }
    if name.chars().count() < NAME_MIN_LEN {
        return Err(FieldError::NameTooShort);
    }
    if !name_pattern().is_match(name) {
        return Err(FieldError::NameInvalidChars);
    }
    Ok(())
}

/// Which age floor applies to the birth date.
///
/// Two rule sets were in use for signup and they disagree, so both are kept
/// and the deployment chooses one (`MT_BIRTH_DATE_RULE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirthDateRule {
    /// Must be at least this many years old today.
    MinimumAge(u32),
    /// Must be born in or before this calendar year.
    CutoffYear(i32),
}

impl Default for BirthDateRule {
    fn default() -> Self {
        Self::MinimumAge(13)
    }
}

impl FromStr for BirthDateRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min-age" => Ok(Self::MinimumAge(13)),
            "cutoff-2012" => Ok(Self::CutoffYear(2012)),
            other => Err(format!("unknown birth date rule: {other}")),
        }
    }
}

impl fmt::Display for BirthDateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MinimumAge(years) => write!(f, "min-age({years})"),
            Self::CutoffYear(year) => write!(f, "cutoff({year})"),
        }
    }
}

/// Validate a `DDMMYYYY` digit string against today's local date.
pub fn validate_birth_date(digits: &str, rule: BirthDateRule) -> Result<(), FieldError> {
    validate_birth_date_on(digits, rule, Local::now().date_naive())
}

pub fn validate_birth_date_on(
    digits: &str,
    rule: BirthDateRule,
    today: NaiveDate,
) -> Result<(), FieldError> {
    let birth = parse_birth_date(digits, rule)?;

    let oldest = today
        .checked_sub_months(Months::new(12 * OLDEST_AGE_YEARS))
        .ok_or(FieldError::BirthDateInvalid)?;
    if birth < oldest {
        return Err(FieldError::BirthDateInvalid);
    }

    match rule {
        BirthDateRule::MinimumAge(years) => {
            let youngest = today
                .checked_sub_months(Months::new(12 * years))
                .ok_or(FieldError::BirthDateInvalid)?;
            if birth > youngest {
                return Err(FieldError::Underage(years));
            }
        }
        BirthDateRule::CutoffYear(year) => {
            if birth.year() > year {
                return Err(FieldError::BornAfterCutoff);
            }
        }
    }

    Ok(())
}

/// Parse `DDMMYYYY` into a calendar date, applying the range checks that do
/// not depend on today's date.
pub fn parse_birth_date(digits: &str, rule: BirthDateRule) -> Result<NaiveDate, FieldError> {
    if digits.is_empty() {
        return Err(FieldError::BirthDateRequired);
    }
    if digits.len() != BIRTH_DATE_DIGITS || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(FieldError::BirthDateInvalid);
    }

    let day: u32 = digits[0..2].parse().map_err(|_| FieldError::BirthDateInvalid)?;
    let month: u32 = digits[2..4].parse().map_err(|_| FieldError::BirthDateInvalid)?;
    let year: i32 = digits[4..8].parse().map_err(|_| FieldError::BirthDateInvalid)?;

    if let BirthDateRule::CutoffYear(cutoff) = rule {
        if year > cutoff {
            return Err(FieldError::BornAfterCutoff);
        }
    }

    if !(1..=31).contains(&day) {
        return Err(FieldError::BirthDayOutOfRange);
    }
    if !(1..=12).contains(&month) {
        return Err(FieldError::BirthMonthOutOfRange);
    }
    if year < EARLIEST_BIRTH_YEAR {
        return Err(FieldError::BirthYearTooEarly);
    }

    NaiveDate::from_ymd_opt(year, month, day).ok_or(FieldError::BirthDateInvalid)
}

pub fn validate_phone(phone: &str) -> Result<(), FieldError> {
    if phone.is_empty() {
        return Err(FieldError::PhoneRequired);
    }

    let digits = digits_only(phone);
    if digits.len() < PHONE_MIN_DIGITS {
        return Err(FieldError::PhoneTooShort);
    }
    if digits.len() > PHONE_MAX_DIGITS {
        return Err(FieldError::PhoneTooLong);
    }

    let ddd: u32 = digits[0..2].parse().map_err(|_| FieldError::PhoneInvalidAreaCode)?;
    if !(11..=99).contains(&ddd) {
        return Err(FieldError::PhoneInvalidAreaCode);
    }
    Ok(())
}

pub fn validate_gender(gender: &str) -> Result<(), FieldError> {
    if gender.is_empty() {
        return Err(FieldError::GenderRequired);
    }
    Ok(())
}

// ============================================================================
// Diary
// ============================================================================

pub fn validate_title(title: &str) -> Result<(), FieldError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(FieldError::TitleRequired);
    }
    if has_emoji(trimmed) {
        return Err(FieldError::TitleHasEmoji);
    }
    if trimmed.chars().count() > TITLE_MAX_LEN {
        return Err(FieldError::TitleTooLong);
    }
    Ok(())
}

pub fn validate_diary_text(text: &str) -> Result<(), FieldError> {
    if text.trim().is_empty() {
        return Err(FieldError::TextRequired);
    }
    Ok(())
}

pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF   // pictographs, emoticons, transport, flags
            | 0x2600..=0x27BF // misc symbols, dingbats
            | 0x2B00..=0x2BFF // arrows and stars
            | 0x1FC00..=0x1FFFF
            | 0xFE0F          // emoji presentation selector
            | 0x200D          // zero width joiner
            | 0x20E3          // keycap
    )
}

pub fn has_emoji(s: &str) -> bool {
    s.chars().any(is_emoji)
}

pub fn remove_emojis(s: &str) -> String {
    s.chars().filter(|c| !is_emoji(*c)).collect()
}

// ============================================================================
// Input masks
// ============================================================================

pub fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `(DD) NNNN-NNNN` for landlines, `(DD) NNNNN-NNNN` for mobiles. Extra digits
/// beyond eleven are dropped.
pub fn format_phone(input: &str) -> String {
    let digits: String = digits_only(input).chars().take(PHONE_MAX_DIGITS).collect();
    let n = digits.len();
    match n {
        0 => String::new(),
        1..=2 => format!("({digits}"),
        3..=6 => format!("({}) {}", &digits[..2], &digits[2..]),
        7..=10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
    }
}

/// `DD/MM/AAAA` built progressively as digits are typed.
pub fn format_date_mask(input: &str) -> String {
    let digits: String = digits_only(input).chars().take(BIRTH_DATE_DIGITS).collect();
    match digits.len() {
        0..=2 => digits,
        3..=4 => format!("{}/{}", &digits[..2], &digits[2..]),
        _ => format!("{}/{}/{}", &digits[..2], &digits[2..4], &digits[4..]),
    }
}
