//! Property-based tests for the pricing and identifier helpers.
//!
//! These exercise the pure functions behind checkout totals, coupon
//! discounts, gateway amounts and slugs across wide input ranges.

use chrono::Utc;
use happy_hopz_api::entities::coupon;
use happy_hopz_api::entities::CouponType;
use happy_hopz_api::services::catalog::slugify;
use happy_hopz_api::services::checkout::{extract_gst, generate_order_number, shipping_fee};
use happy_hopz_api::services::coupons::{discount_for, normalize_code};
use happy_hopz_api::services::payments::to_minor_units;
use happy_hopz_api::PaginatedResponse;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Rupee amounts on the paise grid, the only amounts the store produces.
fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..1_000_000, 0i64..100).prop_map(|(rupees, paise)| Decimal::new(rupees * 100 + paise, 2))
}

fn coupon_row(discount_type: CouponType, value: Decimal, cap: Option<Decimal>) -> coupon::Model {
    let now = Utc::now();
    coupon::Model {
        id: Uuid::new_v4(),
        code: "PROP".to_string(),
        description: None,
        discount_type,
        discount_value: value,
        min_order_amount: Decimal::ZERO,
        max_discount_amount: cap,
        max_uses: None,
        used_count: 0,
        valid_from: now,
        valid_until: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

// ==================== Order numbers ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn order_numbers_are_short_prefixed_and_unambiguous(_seed in any::<u64>()) {
        let number = generate_order_number();
        prop_assert!(number.starts_with("HH-"), "bad prefix: {}", number);
        prop_assert_eq!(number.len(), 9);
        let suffix = &number[3..];
        prop_assert!(
            suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()),
            "unexpected characters: {}", number
        );
        // 0/O and 1/I are left out so numbers survive being read aloud
        prop_assert!(
            !suffix.chars().any(|c| matches!(c, '0' | 'O' | '1' | 'I')),
            "ambiguous character in {}", number
        );
    }
}

// ==================== GST extraction ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn gst_is_a_proper_share_of_the_gross(gross in money_strategy(), rate in 1i64..=100) {
        let gst = extract_gst(gross, Decimal::from(rate));
        prop_assert!(gst >= Decimal::ZERO);
        prop_assert!(gst <= gross, "gst {} exceeds gross {}", gst, gross);
        prop_assert!(gst.scale() <= 2, "gst {} has sub-paise precision", gst);
        if gross > Decimal::ONE {
            // The tax is extracted from the gross, never added on top
            let net = gross - gst;
            prop_assert!(net > Decimal::ZERO);
        }
    }

    #[test]
    fn gst_is_zero_for_zero_rate_or_gross(gross in money_strategy(), rate in 0i64..=100) {
        prop_assert_eq!(extract_gst(gross, Decimal::ZERO), Decimal::ZERO);
        prop_assert_eq!(extract_gst(Decimal::ZERO, Decimal::from(rate)), Decimal::ZERO);
    }

    #[test]
    fn gst_grows_with_the_rate(gross in money_strategy()) {
        let low = extract_gst(gross, Decimal::from(5));
        let high = extract_gst(gross, Decimal::from(28));
        prop_assert!(low <= high, "gst fell as the rate rose: {} vs {}", low, high);
    }
}

// ==================== Shipping ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn shipping_is_flat_or_free(subtotal in money_strategy()) {
        let threshold = Decimal::from(999);
        let flat = Decimal::from(79);
        let fee = shipping_fee(subtotal, threshold, flat);
        prop_assert!(fee == Decimal::ZERO || fee == flat);

        if subtotal >= threshold || subtotal <= Decimal::ZERO {
            prop_assert_eq!(fee, Decimal::ZERO);
        } else {
            prop_assert_eq!(fee, flat);
        }
    }
}

// ==================== Gateway minor units ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn paise_conversion_is_exact_on_the_money_grid(rupees in 0i64..1_000_000, paise in 0i64..100) {
        let amount = Decimal::new(rupees * 100 + paise, 2);
        prop_assert_eq!(to_minor_units(amount), Some(rupees * 100 + paise));
    }
}

// ==================== Coupon normalization and discounts ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn code_normalization_trims_uppercases_and_settles(raw in "\\s{0,3}[a-zA-Z0-9]{1,12}\\s{0,3}") {
        let normalized = normalize_code(&raw);
        prop_assert_eq!(normalized.clone(), raw.trim().to_uppercase());
        prop_assert_eq!(normalize_code(&normalized), normalized);
    }

    #[test]
    fn percentage_discounts_never_exceed_the_subtotal(
        subtotal in money_strategy(),
        percent in 0i64..=100,
    ) {
        let row = coupon_row(CouponType::Percentage, Decimal::from(percent), None);
        let discount = discount_for(&row, subtotal);
        prop_assert!(discount >= Decimal::ZERO);
        prop_assert!(discount <= subtotal, "discount {} > subtotal {}", discount, subtotal);
        if percent == 100 {
            prop_assert_eq!(discount, subtotal);
        }
    }

    #[test]
    fn percentage_caps_bind(subtotal in money_strategy(), percent in 1i64..=100) {
        let cap = Decimal::new(5000, 2); // 50.00
        let row = coupon_row(CouponType::Percentage, Decimal::from(percent), Some(cap));
        let discount = discount_for(&row, subtotal);
        prop_assert!(discount <= cap);
        prop_assert!(discount <= subtotal);
    }

    #[test]
    fn flat_discounts_stop_at_the_subtotal(subtotal in money_strategy(), flat in money_strategy()) {
        let row = coupon_row(CouponType::Flat, flat, None);
        let discount = discount_for(&row, subtotal);
        prop_assert_eq!(discount, flat.min(subtotal));
    }
}

// ==================== Slugs ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn slugs_are_clean_url_segments(input in ".{0,80}") {
        let slug = slugify(&input);
        prop_assert!(
            slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "slug {:?} carries other characters", slug
        );
        prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
        prop_assert!(!slug.contains("--"), "separator runs collapse: {:?}", slug);
    }

    #[test]
    fn slugify_is_idempotent(input in ".{0,80}") {
        let once = slugify(&input);
        prop_assert_eq!(slugify(&once), once);
    }

    #[test]
    fn alphanumeric_names_survive_lowercased(name in "[A-Za-z0-9]{1,40}") {
        prop_assert_eq!(slugify(&name), name.to_lowercase());
    }
}

// ==================== Pagination ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn page_counts_cover_the_total_exactly(total in 0u64..100_000, per_page in 1u64..500) {
        let page: PaginatedResponse<u8> = PaginatedResponse::new(vec![], total, 1, per_page);
        if total == 0 {
            prop_assert_eq!(page.total_pages, 0);
        } else {
            prop_assert!(page.total_pages * per_page >= total);
            prop_assert!((page.total_pages - 1) * per_page < total);
        }
    }

    #[test]
    fn zero_per_page_is_treated_as_one(total in 1u64..10_000) {
        let page: PaginatedResponse<u8> = PaginatedResponse::new(vec![], total, 1, 0);
        prop_assert_eq!(page.total_pages, total);
    }
}
