use unicode_general_category::{get_general_category, GeneralCategory};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Password strength rule shared by registration and reset confirmation:
/// at least [`MIN_PASSWORD_LEN`] characters with an uppercase letter, a
/// lowercase letter, a digit and a punctuation or symbol character.
pub fn is_strong(password: &str) -> bool {
    let mut len = 0usize;
    let (mut upper, mut lower, mut digit, mut special) = (false, false, false, false);

    for c in password.chars() {
        len += 1;
        match get_general_category(c) {
            GeneralCategory::UppercaseLetter => upper = true,
            GeneralCategory::LowercaseLetter => lower = true,
            GeneralCategory::DecimalNumber => digit = true,
            cat if is_punct_or_symbol(cat) => special = true,
            _ => {}
        }
    }

    len >= MIN_PASSWORD_LEN && upper && lower && digit && special
}

fn is_punct_or_symbol(cat: GeneralCategory) -> bool {
    matches!(
        cat,
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
            | GeneralCategory::MathSymbol
            | GeneralCategory::CurrencySymbol
            | GeneralCategory::ModifierSymbol
            | GeneralCategory::OtherSymbol
    )
}
