// File: ./src/importer/script.rs
// Writing-system detection for feeds that mix languages.
//
// Feeds are published per language, but a Finnish feed may carry Russian or
// Arabic event names. Text is routed to the first candidate language whose
// script matches the text's dominant script.
use crate::model::Translated;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Cyrillic,
    Arabic,
    Han,
}

pub fn script_for_language(lang: &str) -> Script {
    match lang {
        "ru" | "uk" | "be" | "bg" | "sr" | "mk" => Script::Cyrillic,
        "ar" | "fa" | "ur" => Script::Arabic,
        "zh_hans" | "zh_hant" | "zh" => Script::Han,
        _ => Script::Latin,
    }
}

fn char_script(c: char) -> Option<Script> {
    match c as u32 {
        0x0400..=0x052F | 0x2DE0..=0x2DFF | 0xA640..=0xA69F => Some(Script::Cyrillic),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => {
            Some(Script::Arabic)
        }
        0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => Some(Script::Han),
        _ if c.is_alphabetic() => Some(Script::Latin),
        _ => None,
    }
}

/// The script most letters of `text` belong to. Ties and letterless text
/// count as Latin.
pub fn detect_script(text: &str) -> Script {
    let mut counts = [0usize; 4];
    for script in text.chars().filter_map(char_script) {
        counts[script as usize] += 1;
    }
    let scripts = [Script::Latin, Script::Cyrillic, Script::Arabic, Script::Han];
    let mut best = Script::Latin;
    for script in scripts {
        if counts[script as usize] > counts[best as usize] {
            best = script;
        }
    }
    best
}

/// Stores `text` in `field` under the first of `languages` written in the
/// same script, or under the first language when none matches.
pub fn set_multiscript_field<S: AsRef<str>>(field: &mut Translated, text: &str, languages: &[S]) {
    let Some(first) = languages.first() else {
        return;
    };
    let script = detect_script(text);
    let lang = languages
        .iter()
        .find(|l| script_for_language(l.as_ref()) == script)
        .unwrap_or(first);
    field.set(lang.as_ref(), Some(text.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_script() {
        assert_eq!(detect_script("Lasten lauantai"), Script::Latin);
        assert_eq!(detect_script("Детский театр"), Script::Cyrillic);
        assert_eq!(detect_script("مساء الخير"), Script::Arabic);
        assert_eq!(detect_script("儿童剧场 2017"), Script::Han);
        assert_eq!(detect_script("2017 – 18"), Script::Latin);
    }

    #[test]
    fn test_multiscript_routes_to_matching_language() {
        let langs = ["fi", "ru", "zh_hans", "ar"];
        let mut field = Translated::new();
        set_multiscript_field(&mut field, "Satutunti", &langs);
        set_multiscript_field(&mut field, "Сказки", &langs);
        assert_eq!(field.get("fi"), Some("Satutunti"));
        assert_eq!(field.get("ru"), Some("Сказки"));
    }

    #[test]
    fn test_multiscript_falls_back_to_first_language() {
        let mut field = Translated::new();
        set_multiscript_field(&mut field, "Сказки", &["sv", "en"]);
        assert_eq!(field.get("sv"), Some("Сказки"));

        let none: [&str; 0] = [];
        set_multiscript_field(&mut field, "x", &none);
        assert_eq!(field.languages().count(), 1);
    }
}
