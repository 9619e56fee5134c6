use std::collections::BTreeMap;

use common::normalize::{amount_from_value, id_to_string, normalize_timestamp, non_blank};
use common::types::{Continuation, SourceDonation, SourcePage};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `GET <site>/api/<id>/donations?page=n&per_page=m`
#[derive(Deserialize, Debug)]
pub struct PagedResponse {
    pub data: Vec<PagedItem>,
    // absent => None, explicit null => Some(None)
    #[serde(default, deserialize_with = "present")]
    pub next_page_url: Option<Option<String>>,
    #[serde(default)]
    pub total: Option<Value>,
}

#[derive(Deserialize, Debug)]
pub struct PagedItem {
    pub id: Value,
    #[serde(default)]
    pub created_at: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub amount: Value,
}

/// Single-shot feed keyed by donation id.
#[derive(Deserialize, Debug)]
pub struct EntitiesResponse {
    pub entities: BTreeMap<String, EntityItem>,
}

#[derive(Deserialize, Debug)]
pub struct EntityItem {
    #[serde(default)]
    pub created_date: Value,
    #[serde(default)]
    pub public_name: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub amount: Value,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PagedResponse {
    pub fn into_page(self, page_size: u32) -> Result<SourcePage, String> {
        let has_more = match &self.next_page_url {
            Some(next) => next.as_deref().is_some_and(|url| !url.trim().is_empty()),
            None => !self.data.is_empty() && self.data.len() >= page_size as usize,
        };
        let total_known = self.total.as_ref().and_then(|t| match t {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_u64(),
        });

        let records = self
            .data
            .into_iter()
            .map(|item| {
                build_donation(
                    &item.id,
                    &item.created_at,
                    item.name,
                    item.message,
                    &item.amount,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SourcePage {
            records,
            continuation: Continuation {
                has_more,
                total_known,
            },
        })
    }
}

impl EntitiesResponse {
    pub fn into_page(self) -> Result<SourcePage, String> {
        let total = self.entities.len() as u64;
        let records = self
            .entities
            .into_iter()
            .map(|(id, item)| {
                build_donation(
                    &Value::String(id),
                    &item.created_date,
                    item.public_name,
                    item.comment,
                    &item.amount,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SourcePage {
            records,
            continuation: Continuation {
                has_more: false,
                total_known: Some(total),
            },
        })
    }
}

fn build_donation(
    id: &Value,
    created: &Value,
    name: Option<String>,
    message: Option<String>,
    amount: &Value,
) -> Result<SourceDonation, String> {
    let id = id_to_string(id).ok_or_else(|| format!("donation without a usable id: {id}"))?;
    let amount = amount_from_value(amount)
        .ok_or_else(|| format!("donation #{id} has a non-numeric amount: {amount}"))?;

    let created_at = normalize_timestamp(created).unwrap_or_else(|| {
        let raw = match created {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        tracing::warn!("Donation #{} has unrecognized timestamp '{}', forwarding as-is", id, raw);
        raw
    });

    Ok(SourceDonation {
        id,
        created_at,
        name: non_blank(name),
        message: non_blank(message),
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paged(body: Value, page_size: u32) -> SourcePage {
        serde_json::from_value::<PagedResponse>(body)
            .unwrap()
            .into_page(page_size)
            .unwrap()
    }

    #[test]
    fn next_page_url_wins_over_page_fullness() {
        let page = paged(
            json!({
                "data": [{ "id": 1, "created_at": "2024-11-03 10:00:00", "amount": 5 }],
                "next_page_url": "https://site/api/x/donations?page=2",
                "total": 40
            }),
            25,
        );
        assert!(page.continuation.has_more);
        assert_eq!(page.continuation.total_known, Some(40));

        let page = paged(
            json!({
                "data": [
                    { "id": 1, "created_at": "2024-11-03 10:00:00", "amount": 5 },
                    { "id": 2, "created_at": "2024-11-03 10:01:00", "amount": 5 }
                ],
                "next_page_url": null
            }),
            2,
        );
        assert!(!page.continuation.has_more);
    }

    #[test]
    fn fullness_decides_when_no_next_page_url() {
        let item = json!({ "id": "a", "created_at": "2024-11-03 10:00:00", "amount": 1 });

        let full = paged(json!({ "data": [item.clone(), item.clone()] }), 2);
        assert!(full.continuation.has_more);

        let partial = paged(json!({ "data": [item] }), 2);
        assert!(!partial.continuation.has_more);

        let empty = paged(json!({ "data": [] }), 2);
        assert!(!empty.continuation.has_more);
    }

    #[test]
    fn paged_items_are_normalized() {
        let page = paged(
            json!({
                "data": [{
                    "id": 981,
                    "created_at": "2024-11-03T12:00:00+02:00",
                    "name": "",
                    "message": "",
                    "amount": "20.00"
                }]
            }),
            25,
        );
        let d = &page.records[0];
        assert_eq!(d.id, "981");
        assert_eq!(d.created_at, "2024-11-03T10:00:00.000Z");
        assert_eq!(d.name, None);
        assert_eq!(d.message, None);
        assert_eq!(d.amount, 20.0);
    }

    #[test]
    fn non_numeric_amount_fails_the_page() {
        let res = serde_json::from_value::<PagedResponse>(json!({
            "data": [{ "id": 1, "created_at": "2024-11-03 10:00:00", "amount": "a lot" }]
        }))
        .unwrap()
        .into_page(25);
        assert!(res.is_err());
    }

    #[test]
    fn entities_feed_is_a_single_page() {
        let page = serde_json::from_value::<EntitiesResponse>(json!({
            "entities": {
                "b7": {
                    "created_date": "2024-11-03T09:30:00Z",
                    "public_name": "Liisa",
                    "comment": "Go go go",
                    "amount": 50
                },
                "a1": { "created_date": "2024-11-03T09:00:00Z", "amount": 10 }
            }
        }))
        .unwrap()
        .into_page()
        .unwrap();

        assert!(!page.continuation.has_more);
        assert_eq!(page.continuation.total_known, Some(2));
        assert_eq!(page.records[0].id, "a1");
        assert_eq!(page.records[1].name.as_deref(), Some("Liisa"));
        assert_eq!(page.records[1].message.as_deref(), Some("Go go go"));
    }
}
