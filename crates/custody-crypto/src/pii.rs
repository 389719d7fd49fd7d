//! Field-level encryption for PII in JSON records.
//!
//! Fields are recognized by a closed enumeration of PII categories with
//! exact (case-insensitive) name matching, not substring matching, so
//! "emailed_at" is never mistaken for an email address.
//!
//! Encrypted fields are replaced by a tagged sub-structure
//! `{_encrypted, _key_id, _value, _algorithm}`. Decryption restores the
//! original string; a field that fails to decrypt becomes JSON `null`
//! instead of failing the whole record. That fail-open sentinel is scoped
//! to bulk redaction only; payload envelopes stay fail-closed.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{Map, Value};
use tracing::warn;

use crate::envelope::EnvelopeCrypto;
use crate::error::CryptoError;
use crate::types::KEY_ALGORITHM;

/// Categories of personally identifiable information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiField {
    SocialSecurityNumber,
    TaxId,
    Phone,
    Email,
    Address,
    DateOfBirth,
    DriverLicense,
    PassportNumber,
    CreditCard,
}

impl PiiField {
    /// Field names recognized for this category.
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            PiiField::SocialSecurityNumber => &["ssn", "social_security_number"],
            PiiField::TaxId => &["tax_id", "ein"],
            PiiField::Phone => &["phone", "phone_number"],
            PiiField::Email => &["email", "email_address"],
            PiiField::Address => &["address", "street_address", "home_address"],
            PiiField::DateOfBirth => &["dob", "date_of_birth", "birth_date"],
            PiiField::DriverLicense => &["driver_license", "drivers_license"],
            PiiField::PassportNumber => &["passport_number", "passport"],
            PiiField::CreditCard => &["credit_card", "credit_card_number", "card_number"],
        }
    }

    const ALL: &'static [PiiField] = &[
        PiiField::SocialSecurityNumber,
        PiiField::TaxId,
        PiiField::Phone,
        PiiField::Email,
        PiiField::Address,
        PiiField::DateOfBirth,
        PiiField::DriverLicense,
        PiiField::PassportNumber,
        PiiField::CreditCard,
    ];

    /// Classify a field name, exact match against each category's aliases.
    pub fn classify(field_name: &str) -> Option<PiiField> {
        let lower = field_name.to_ascii_lowercase();
        PiiField::ALL
            .iter()
            .copied()
            .find(|kind| kind.aliases().contains(&lower.as_str()))
    }
}

impl EnvelopeCrypto {
    /// Encrypt every recognized PII field in a JSON object.
    ///
    /// Only top-level string fields are touched; everything else passes
    /// through unchanged. Non-object values are returned as-is.
    pub fn encrypt_pii_fields(&self, record: &Value) -> Result<Value, CryptoError> {
        let Value::Object(fields) = record else {
            return Ok(record.clone());
        };

        let mut out = Map::new();
        for (name, value) in fields {
            match (PiiField::classify(name), value.as_str()) {
                (Some(_), Some(text)) => {
                    let (envelope, key_id) = self.encrypt(text.as_bytes(), None)?;
                    out.insert(
                        name.clone(),
                        serde_json::json!({
                            "_encrypted": true,
                            "_key_id": key_id,
                            "_value": BASE64.encode(&envelope),
                            "_algorithm": KEY_ALGORITHM,
                        }),
                    );
                }
                _ => {
                    out.insert(name.clone(), value.clone());
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Decrypt every encrypted PII field in a JSON object.
    ///
    /// A field whose ciphertext fails to decode or decrypt becomes `null`
    /// so the rest of the record stays readable.
    pub fn decrypt_pii_fields(&self, record: &Value) -> Result<Value, CryptoError> {
        let Value::Object(fields) = record else {
            return Ok(record.clone());
        };

        let mut out = Map::new();
        for (name, value) in fields {
            if !is_encrypted_field(value) {
                out.insert(name.clone(), value.clone());
                continue;
            }
            out.insert(name.clone(), self.decrypt_field(name, value));
        }
        Ok(Value::Object(out))
    }

    fn decrypt_field(&self, name: &str, value: &Value) -> Value {
        let result = (|| -> Result<String, CryptoError> {
            let key_id = value
                .get("_key_id")
                .and_then(|v| v.as_str())
                .ok_or(CryptoError::MissingEncryptedField("_key_id"))?;
            let encoded = value
                .get("_value")
                .and_then(|v| v.as_str())
                .ok_or(CryptoError::MissingEncryptedField("_value"))?;
            let envelope = BASE64
                .decode(encoded)
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;
            let plaintext = self.decrypt(&envelope, key_id, None)?;
            String::from_utf8(plaintext).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
        })();

        match result {
            Ok(text) => Value::String(text),
            Err(err) => {
                warn!(field = %name, error = %err, "PII field failed to decrypt, nulled");
                Value::Null
            }
        }
    }
}

fn is_encrypted_field(value: &Value) -> bool {
    value
        .get("_encrypted")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn crypto() -> EnvelopeCrypto {
        let mut key = [0u8; 32];
        getrandom::getrandom(&mut key).unwrap();
        EnvelopeCrypto::new(key)
    }

    #[test]
    fn classify_exact_names() {
        assert_eq!(
            PiiField::classify("ssn"),
            Some(PiiField::SocialSecurityNumber)
        );
        assert_eq!(PiiField::classify("Email"), Some(PiiField::Email));
        assert_eq!(PiiField::classify("date_of_birth"), Some(PiiField::DateOfBirth));
        assert_eq!(PiiField::classify("case_id"), None);
    }

    #[test]
    fn no_substring_false_positives() {
        assert_eq!(PiiField::classify("emailed_at"), None);
        assert_eq!(PiiField::classify("ssn_redacted"), None);
        assert_eq!(PiiField::classify("shipping_address_count"), None);
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let crypto = crypto();
        let record = json!({
            "name": "Jordan Doe",
            "ssn": "123-45-6789",
            "email": "jordan@example.com",
            "case_id": "case-1",
        });

        let encrypted = crypto.encrypt_pii_fields(&record).unwrap();
        assert_eq!(encrypted["name"], "Jordan Doe");
        assert_eq!(encrypted["case_id"], "case-1");
        assert_eq!(encrypted["ssn"]["_encrypted"], true);
        assert_eq!(encrypted["ssn"]["_algorithm"], KEY_ALGORITHM);
        assert_ne!(encrypted["ssn"]["_value"], "123-45-6789");

        let decrypted = crypto.decrypt_pii_fields(&encrypted).unwrap();
        assert_eq!(decrypted, record);
    }

    #[test]
    fn non_string_pii_passes_through() {
        let crypto = crypto();
        let record = json!({"ssn": 123456789});
        let encrypted = crypto.encrypt_pii_fields(&record).unwrap();
        assert_eq!(encrypted["ssn"], 123456789);
    }

    #[test]
    fn corrupted_field_becomes_null() {
        let crypto = crypto();
        let record = json!({"ssn": "123-45-6789", "phone": "555-0100"});
        let mut encrypted = crypto.encrypt_pii_fields(&record).unwrap();

        // Corrupt one field's ciphertext; the other must survive.
        encrypted["ssn"]["_value"] = Value::String("AAAA".into());

        let decrypted = crypto.decrypt_pii_fields(&encrypted).unwrap();
        assert_eq!(decrypted["ssn"], Value::Null);
        assert_eq!(decrypted["phone"], "555-0100");
    }

    #[test]
    fn non_object_value_unchanged() {
        let crypto = crypto();
        let v = json!(["not", "an", "object"]);
        assert_eq!(crypto.encrypt_pii_fields(&v).unwrap(), v);
        assert_eq!(crypto.decrypt_pii_fields(&v).unwrap(), v);
    }
}
