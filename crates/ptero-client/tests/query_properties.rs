//! Property tests for query string rendering.

use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;

use ptero_client::Query;

fn build(
    filter: &Option<(String, String)>,
    include: &[String],
    sort: &Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
    extra: &[(String, String)],
) -> Query {
    // Apply options back to front so ordering cannot come from call order.
    let mut query = Query::new();
    for (key, value) in extra {
        query = query.param(key.clone(), value.clone());
    }
    if let Some(per_page) = per_page {
        query = query.per_page(per_page);
    }
    if let Some(page) = page {
        query = query.page(page);
    }
    if let Some(sort) = sort {
        query = query.sort(sort.clone());
    }
    for name in include {
        query = query.include(name.clone());
    }
    if let Some((field, value)) = filter {
        query = query.filter(field.clone(), value.clone());
    }
    query
}

proptest! {
    #[test]
    fn empty_iff_no_options(
        filter in option::of(("[a-z]{1,8}", "[a-z0-9]{1,8}")),
        include in vec("[a-z]{1,8}", 0..4),
        sort in option::of("-?[a-z]{1,8}"),
        page in option::of(1u64..=500),
        per_page in option::of(1u64..=100),
        extra in vec(("[a-z]{1,8}", "[a-z0-9]{1,8}"), 0..3),
    ) {
        let query = build(&filter, &include, &sort, page, per_page, &extra);
        let rendered = query.to_string();

        let no_options = filter.is_none()
            && include.is_empty()
            && sort.is_none()
            && page.is_none()
            && per_page.is_none()
            && extra.is_empty();

        prop_assert_eq!(rendered.is_empty(), no_options);
        prop_assert_eq!(query.is_empty(), no_options);
        if !rendered.is_empty() {
            prop_assert!(rendered.starts_with('?'));
        }
    }

    #[test]
    fn component_order_is_filter_include_sort_page_per_page_extra(
        filter in option::of(("[a-z]{1,8}", "[a-z0-9]{1,8}")),
        include in vec("[a-z]{1,8}", 0..4),
        sort in option::of("[a-z]{1,8}"),
        page in option::of(1u64..=500),
        per_page in option::of(1u64..=100),
        extra in vec(("zz[a-z]{1,6}", "[a-z0-9]{1,8}"), 0..3),
    ) {
        let query = build(&filter, &include, &sort, page, per_page, &extra);
        let rendered = query.to_string();

        let mut positions = Vec::new();
        if filter.is_some() {
            positions.push(rendered.find("filter[").expect("filter present"));
        }
        if !include.is_empty() {
            positions.push(rendered.find("include=").expect("include present"));
        }
        if sort.is_some() {
            positions.push(rendered.find("sort=").expect("sort present"));
        }
        if page.is_some() {
            positions.push(rendered.find("page=").expect("page present"));
        }
        if per_page.is_some() {
            positions.push(rendered.find("per_page=").expect("per_page present"));
        }
        for (key, _) in &extra {
            positions.push(rendered.find(&format!("{key}=")).expect("extra present"));
        }

        // "page=" also occurs inside "per_page="; when both are present the
        // earliest "page=" match is the real one, so strictly increasing
        // positions still hold for the canonical order.
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        prop_assert_eq!(&positions, &sorted);
    }

    #[test]
    fn rendering_is_deterministic(
        filter in option::of(("[a-z]{1,8}", "[a-z0-9 ]{1,8}")),
        include in vec("[a-z]{1,8}", 0..4),
        page in option::of(1u64..=500),
    ) {
        let query = build(&filter, &include, &None, page, None, &[]);

        let first = query.to_string();
        let second = query.to_string();
        let cloned = query.clone().to_string();

        prop_assert_eq!(&first, &second);
        prop_assert_eq!(&first, &cloned);
    }
}
