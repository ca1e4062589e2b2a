//! Derived names for a model: plural, capitalized, and the data keys used by pagination and views.
//! e.g. "customer" -> "customers", "Customer", "Customers", "customerscount", "customerpages".

use serde::Serialize;

/// Inflection bundle for one model name. Pure function of the name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub name: String,
    pub name_plural: String,
    pub capital_name: String,
    pub page_plural_title: String,
    pub page_plural_count: String,
    pub page_plural_query: String,
    pub page_single_count: String,
    pub page_pages: String,
}

impl ViewModel {
    pub fn expand(model_name: &str) -> Self {
        let name_plural = pluralize(model_name);
        ViewModel {
            name: model_name.to_string(),
            capital_name: capitalize(model_name),
            page_plural_title: capitalize(&name_plural),
            page_plural_count: format!("{}count", name_plural),
            page_plural_query: format!("{}query", name_plural),
            page_single_count: format!("{}count", model_name),
            page_pages: format!("{}pages", model_name),
            name_plural,
        }
    }

    /// `{name}{suffix}`, e.g. "examplelimit", "examplepage_next".
    pub fn single_key(&self, suffix: &str) -> String {
        format!("{}{}", self.name, suffix)
    }

    /// `{name_plural}{suffix}`, e.g. "examplestotal", "examplesperpage".
    pub fn plural_key(&self, suffix: &str) -> String {
        format!("{}{}", self.name_plural, suffix)
    }
}

/// Regular English plural. Empty input stays empty.
pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    pluralizer::pluralize(word, 2, false)
}

/// First letter uppercase, the rest lowercase.
/// e.g. "customer" -> "Customer", "oRDERs" -> "Orders"
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(s.len());
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
            out
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_customer() {
        let vm = ViewModel::expand("customer");
        assert_eq!(vm.name, "customer");
        assert_eq!(vm.name_plural, "customers");
        assert_eq!(vm.capital_name, "Customer");
        assert_eq!(vm.page_plural_title, "Customers");
        assert_eq!(vm.page_plural_count, "customerscount");
        assert_eq!(vm.page_plural_query, "customersquery");
        assert_eq!(vm.page_single_count, "customercount");
        assert_eq!(vm.page_pages, "customerpages");
    }

    #[test]
    fn expansion_is_deterministic() {
        assert_eq!(ViewModel::expand("example"), ViewModel::expand("example"));
    }

    #[test]
    fn key_helpers() {
        let vm = ViewModel::expand("example");
        assert_eq!(vm.single_key("page_next"), "examplepage_next");
        assert_eq!(vm.plural_key("total"), "examplestotal");
    }

    #[test]
    fn empty_name_does_not_panic() {
        let vm = ViewModel::expand("");
        assert_eq!(vm.name_plural, "");
        assert_eq!(vm.capital_name, "");
        assert_eq!(vm.page_pages, "pages");
    }

    #[test]
    fn capitalize_lowercases_tail() {
        assert_eq!(capitalize("oRDERs"), "Orders");
        assert_eq!(capitalize("x"), "X");
    }
}
