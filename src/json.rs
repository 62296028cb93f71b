// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! A list renders as an array of its records in list order. Each record is an
//! object with its id, state, version and deletion flag, and its fields keyed by
//! the names in [`Record::FIELDS`](crate::Record::FIELDS). Unset fields are left
//! out.
//!
//! Encrypted fields never render their plaintext: they show the base64 of their
//! ciphertext, or `null` if they have not been encrypted yet.
//!
//! # Example
//!
//! ```json
//! [
//!   {
//!     "id": 1,
//!     "state": "CHANGED",
//!     "version": 1,
//!     "deleted": false,
//!     "fields": {
//!       "Name": "Bank A",
//!       "Notes": "AcYc0mHq7Zs0bm1mY2Vn..."
//!     }
//!   }
//! ]
//! ```
use crate::{
    DataList, Record,
    values::{FieldValue, Value},
};
use serde_json::{Map, Value as Json};

fn base64(bytes: &[u8]) -> Json {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes).into()
}

/// Converts a plaintext [`Value`] to a [`serde_json::Value`].
impl From<&Value> for Json {
    fn from(value: &Value) -> Self {
        match value {
            Value::Bool(v) => (*v).into(),
            Value::Integer(v) => (*v).into(),
            Value::Text(v) => v.as_str().into(),
            Value::Date(v) => v.format("%Y-%m-%d").to_string().into(),
            // as a string, so that no precision is lost
            Value::Decimal(v) => v.to_string().into(),
            Value::Bytes(v) => base64(v),
            Value::Link(v) => (*v).into(),
        }
    }
}

/// Converts a field slot to a [`serde_json::Value`], hiding encrypted plaintext.
impl From<&FieldValue> for Json {
    fn from(field: &FieldValue) -> Self {
        match field {
            FieldValue::Plain(value) => value.into(),
            FieldValue::Encrypted(encrypted) => encrypted
                .ciphertext()
                .map_or(Json::Null, |bytes| base64(bytes)),
        }
    }
}

impl<R: Record> DataList<R> {
    /// Renders the list as JSON.
    pub fn to_json(&self) -> Json {
        self.iter().map(record_to_json).collect()
    }
}

fn record_to_json<R: Record>(record: &R) -> Json {
    let item = record.item();
    let fields: Map<String, Json> = item
        .values()
        .iter()
        .filter_map(|(field, slot)| {
            let name = R::FIELDS.get(field)?.name;
            Some((name.to_owned(), Json::from(slot?)))
        })
        .collect();

    let mut object = Map::new();
    object.insert("id".into(), item.id().into());
    object.insert("state".into(), item.state().name().into());
    object.insert("version".into(), item.version().into());
    object.insert("deleted".into(), item.is_deleted().into());
    object.insert("fields".into(), fields.into());
    Json::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Decimal, ListStyle,
        encrypted::Encryptable,
        test_util::{Payee, test_cipher},
    };
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn values() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let amount: Decimal = "10.50".parse().unwrap();
        assert_eq!(Json::from(&Value::from(date)), json!("2025-03-01"));
        assert_eq!(Json::from(&Value::from(amount)), json!("10.50"));
        assert_eq!(Json::from(&Value::from(vec![1u8, 2, 3])), json!("AQID"));
        assert_eq!(Json::from(&Value::Link(4)), json!(4));
        assert_eq!(Json::from(&Value::from(-3i64)), json!(-3));
    }

    #[test]
    fn list_rendering() {
        let mut list = DataList::<Payee>::new(ListStyle::Core);
        list.add_loaded(1, Payee::with_plain_notes("Bank", "pin 1234"))
            .unwrap();
        list.add_loaded(2, Payee::values("Gym")).unwrap();
        assert_eq!(
            list.to_json(),
            json!([
                {
                    "id": 1,
                    "state": "CLEAN",
                    "version": 0,
                    "deleted": false,
                    "fields": { "Name": "Bank", "Notes": null }
                },
                {
                    "id": 2,
                    "state": "CLEAN",
                    "version": 0,
                    "deleted": false,
                    "fields": { "Name": "Gym" }
                }
            ])
        );
    }

    #[test]
    fn encrypted_fields_render_as_ciphertext() {
        let cipher = test_cipher(1);
        let mut list = DataList::<Payee>::new(ListStyle::Core);
        list.add_loaded(1, Payee::with_notes("Bank", "pin 1234", &cipher))
            .unwrap();
        let rendered = list.to_json();
        let notes = rendered[0]["fields"]["Notes"].as_str().unwrap();
        assert!(!notes.contains("pin"));
        let bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, notes).unwrap();
        assert_eq!(
            cipher.decrypt(&bytes).unwrap(),
            Value::from("pin 1234").to_plain_bytes()
        );
    }
}
