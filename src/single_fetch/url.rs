use url::Url;

/// Rewrite a navigation URL to its single fetch endpoint.
///
/// The root path maps to `/_root.data`, any other path `X` to `X.data`.
/// Query and host are left alone.
pub fn single_fetch_url(url: &Url) -> Url {
    let mut url = url.clone();
    let path = match url.path() {
        "/" => "/_root.data".to_string(),
        path => format!("{path}.data"),
    };
    url.set_path(&path);
    url
}

/// Drop every `index` query parameter, then re-append the ones that carry
/// a value, in their original order.
///
/// A naked `?index` is only meaningful to the action that was submitted,
/// not to the loaders revalidated after it.
pub fn strip_index_param(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs.iter().any(|(key, _)| key == "index") {
        return url.clone();
    }

    let (index, mut kept): (Vec<_>, Vec<_>) =
        pairs.into_iter().partition(|(key, _)| key == "index");
    kept.extend(index.into_iter().filter(|(_, value)| !value.is_empty()));

    let mut url = url.clone();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn root_path() {
        assert_eq!(
            single_fetch_url(&url("https://h/")).as_str(),
            "https://h/_root.data"
        );
    }

    #[test]
    fn nested_path_keeps_query() {
        assert_eq!(
            single_fetch_url(&url("https://h/a/b?x=1")).as_str(),
            "https://h/a/b.data?x=1"
        );
    }

    #[test]
    fn strip_naked_index() {
        assert_eq!(
            strip_index_param(&url("https://h/a?index&foo=1")).as_str(),
            "https://h/a?foo=1"
        );
        assert_eq!(
            strip_index_param(&url("https://h/a?index")).as_str(),
            "https://h/a"
        );
    }

    #[test]
    fn keep_valued_index() {
        assert_eq!(
            strip_index_param(&url("https://h/a?index=x")).as_str(),
            "https://h/a?index=x"
        );
        assert_eq!(
            strip_index_param(&url("https://h/a?index=1&index&q=2&index=3")).as_str(),
            "https://h/a?q=2&index=1&index=3"
        );
    }

    #[test]
    fn no_index_untouched() {
        let original = url("https://h/a?b=%20c");
        assert_eq!(strip_index_param(&original), original);
    }

    proptest! {
        #[test]
        fn data_suffix(segments in prop::collection::vec("[a-z0-9_-]{1,8}", 1..4)) {
            let path = format!("/{}", segments.join("/"));
            let transformed = single_fetch_url(&url(&format!("https://h{path}?q=1")));
            prop_assert_eq!(transformed.path(), format!("{path}.data"));
            prop_assert_eq!(transformed.query(), Some("q=1"));
        }

        #[test]
        fn stripping_is_idempotent(
            params in prop::collection::vec(("(index|a|b)", "[a-z]{0,3}"), 0..6),
        ) {
            let mut base = url("https://h/p");
            if !params.is_empty() {
                base.query_pairs_mut().extend_pairs(&params);
            }
            let once = strip_index_param(&base);
            prop_assert_eq!(strip_index_param(&once), once.clone());
            prop_assert!(once.query_pairs().all(|(k, v)| k != "index" || !v.is_empty()));
        }
    }
}
