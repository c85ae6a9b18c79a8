//! Registrant contact data.

use serde::{Deserialize, Serialize};

/// WHOIS contact details of the client a domain is registered for.
///
/// Resolved from the client directory and handed to the registrar on
/// `register`. The `email` doubles as the hosting account contact address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrantDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postcode: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

impl RegistrantDetails {
    /// Creates contact details with only a name and e-mail set.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            state: String::new(),
            postcode: String::new(),
            country: String::new(),
            tax_id: None,
        }
    }

    /// Returns the names of mandatory WHOIS fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("postcode", &self.postcode),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_leaves_address_fields_blank() {
        let details = RegistrantDetails::new("Ana Souza", "ana@example.com");
        assert_eq!(
            details.missing_fields(),
            vec!["phone", "address", "city", "postcode", "country"]
        );
    }

    #[test]
    fn complete_details_have_no_missing_fields() {
        let details = RegistrantDetails {
            phone: "+55.1199999999".into(),
            address: "Rua A, 1".into(),
            city: "São Paulo".into(),
            state: "SP".into(),
            postcode: "01000-000".into(),
            country: "BR".into(),
            ..RegistrantDetails::new("Ana Souza", "ana@example.com")
        };
        assert!(details.missing_fields().is_empty());
    }

    #[test]
    fn tax_id_is_omitted_when_absent() {
        let json = serde_json::to_value(RegistrantDetails::new("A", "a@b.c")).unwrap();
        assert!(json.get("tax_id").is_none());
    }
}
