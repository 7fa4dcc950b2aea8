// Lead masking for trial tiers.
//
// Demo accounts see obscured contact details with an upgrade nudge;
// starter accounts only lose phone numbers; pro and ultimate see
// everything. Leads are arbitrary JSON rows coming out of the scrapers,
// so masking works on `serde_json::Value` objects.

use serde_json::{Map, Value};

use crate::models::Plan;

/// Mask a batch of leads according to the viewer's plan
pub fn mask_leads_for_plan(leads: Vec<Value>, plan: Plan) -> Vec<Value> {
    match plan {
        Plan::Demo => leads.into_iter().map(mask_demo_lead).collect(),
        Plan::Starter => leads.into_iter().map(mask_starter_lead).collect(),
        Plan::Pro | Plan::Ultimate => leads,
    }
}

fn mask_demo_lead(lead: Value) -> Value {
    let Value::Object(mut fields) = lead else {
        return lead;
    };

    mask_string_field(&mut fields, "email", mask_email);
    mask_string_field(&mut fields, "handle", mask_handle);
    mask_string_field(&mut fields, "phone", mask_phone);

    fields.insert("demo_mode".to_string(), Value::Bool(true));
    fields.insert(
        "upgrade_message".to_string(),
        Value::String("Upgrade to see full contact details".to_string()),
    );

    Value::Object(fields)
}

fn mask_starter_lead(lead: Value) -> Value {
    let Value::Object(mut fields) = lead else {
        return lead;
    };
    mask_string_field(&mut fields, "phone", mask_phone);
    Value::Object(fields)
}

fn mask_string_field(fields: &mut Map<String, Value>, key: &str, mask: fn(&str) -> String) {
    if let Some(Value::String(value)) = fields.get(key) {
        if !value.is_empty() {
            let masked = mask(value);
            fields.insert(key.to_string(), Value::String(masked));
        }
    }
}

fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((name, domain)) => {
            let prefix: String = name.chars().take(2).collect();
            format!("{}***@{}", prefix, domain)
        },
        None => email.to_string(),
    }
}

fn mask_handle(handle: &str) -> String {
    let prefix: String = handle.chars().take(3).collect();
    format!("{}***", prefix)
}

fn mask_phone(phone: &str) -> String {
    if phone.chars().count() >= 4 {
        let tail: String = phone
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("***-***-{}", tail)
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_lead() -> Value {
        json!({
            "name": "Jane Doe",
            "email": "jane.doe@example.com",
            "handle": "janedoe_fit",
            "phone": "555-123-4567"
        })
    }

    #[test]
    fn test_demo_masking() {
        let masked = mask_leads_for_plan(vec![sample_lead()], Plan::Demo);
        let lead = &masked[0];

        assert_eq!(lead["email"], "ja***@example.com");
        assert_eq!(lead["handle"], "jan***");
        assert_eq!(lead["phone"], "***-***-4567");
        assert_eq!(lead["demo_mode"], true);
        assert!(lead["upgrade_message"].is_string());
        // Non-contact fields pass through untouched
        assert_eq!(lead["name"], "Jane Doe");
    }

    #[test]
    fn test_starter_masks_only_phone() {
        let masked = mask_leads_for_plan(vec![sample_lead()], Plan::Starter);
        let lead = &masked[0];

        assert_eq!(lead["email"], "jane.doe@example.com");
        assert_eq!(lead["handle"], "janedoe_fit");
        assert_eq!(lead["phone"], "***-***-4567");
        assert!(lead.get("demo_mode").is_none());
    }

    #[test]
    fn test_paid_plans_see_everything() {
        for plan in [Plan::Pro, Plan::Ultimate] {
            let masked = mask_leads_for_plan(vec![sample_lead()], plan);
            assert_eq!(masked[0], sample_lead());
        }
    }

    #[test]
    fn test_short_phone_fully_masked() {
        let masked = mask_leads_for_plan(vec![json!({"phone": "911"})], Plan::Demo);
        assert_eq!(masked[0]["phone"], "***");
    }

    #[test]
    fn test_non_object_lead_passes_through() {
        let masked = mask_leads_for_plan(vec![json!("raw string row")], Plan::Demo);
        assert_eq!(masked[0], json!("raw string row"));
    }
}
