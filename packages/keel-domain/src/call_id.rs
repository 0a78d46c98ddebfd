use time::OffsetDateTime;
use uuid::Uuid;

/// Generates a date-scoped call identifier, e.g. `call_2026_02_09_a1b2c3`.
/// Collision handling is the storage layer's concern; callers regenerate on a
/// unique-key conflict.
pub fn generate(now: OffsetDateTime) -> String {
	let suffix = Uuid::new_v4().simple().to_string();

	format!(
		"call_{:04}_{:02}_{:02}_{}",
		now.year(),
		u8::from(now.month()),
		now.day(),
		&suffix[..6]
	)
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	#[test]
	fn formats_date_scoped_identifier() {
		let id = generate(datetime!(2026-02-09 10:30 UTC));

		assert!(id.starts_with("call_2026_02_09_"));
		assert_eq!(id.len(), "call_2026_02_09_".len() + 6);
		assert!(crate::lookup::detect(&id).is_some());
	}

	#[test]
	fn consecutive_ids_differ() {
		let now = OffsetDateTime::now_utc();

		assert_ne!(generate(now), generate(now));
	}
}
