//! Copy-on-transform view over the host's resolve record.
//!
//! A [`Request`] captures `specifier`, `from_file` and `meta` when it is
//! built. Each transformation writes the shared record and returns a new
//! `Request` re-read from it, so a view somebody is still holding never
//! changes underneath them. Only the newest view reflects the record.

use crate::host::{Meta, ResolveDataHandle};
use crate::paths::directory_of;
use crate::virtual_modules::encode_virtual_specifier;
use std::sync::Arc;
use tracing::trace;

/// Resolver-facing request over a host [`ResolveDataHandle`].
#[derive(Debug, Clone)]
pub struct Request {
    handle: ResolveDataHandle,
    app_root: Arc<str>,
    specifier: String,
    from_file: String,
    meta: Option<Meta>,
    is_virtual: bool,
}

impl Request {
    /// Build a request from the host record.
    ///
    /// Returns `None` when the record has no `request` or no `context`;
    /// such records are not ours and the host should resolve them as usual.
    #[must_use]
    pub fn from_handle(handle: ResolveDataHandle, app_root: impl Into<Arc<str>>) -> Option<Self> {
        let valid = handle.read(|d| d.request.is_some() && d.context.is_some());
        if !valid {
            return None;
        }
        Some(Self::derive(handle, app_root.into(), false))
    }

    fn derive(handle: ResolveDataHandle, app_root: Arc<str>, is_virtual: bool) -> Self {
        let (specifier, from_file, meta) = handle.read(|d| {
            (
                d.request.clone().unwrap_or_default(),
                d.context_info.issuer.clone().unwrap_or_default(),
                d.context_info.meta.clone(),
            )
        });
        Self {
            handle,
            app_root,
            specifier,
            from_file,
            meta,
            is_virtual,
        }
    }

    fn next(&self, is_virtual: bool) -> Self {
        Self::derive(self.handle.clone(), Arc::clone(&self.app_root), is_virtual)
    }

    /// Specifier as of this view.
    #[must_use]
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    /// Importing file as of this view. Empty when the host gave none.
    #[must_use]
    pub fn from_file(&self) -> &str {
        &self.from_file
    }

    #[must_use]
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Whether this view was produced by [`virtualize`](Self::virtualize).
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    #[must_use]
    pub fn app_root(&self) -> &str {
        &self.app_root
    }

    /// The live record behind this view.
    #[must_use]
    pub fn handle(&self) -> &ResolveDataHandle {
        &self.handle
    }

    /// Rewrite the specifier.
    pub fn alias(self, specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        trace!(from = %self.specifier, to = %specifier, "alias");
        self.handle.update(|d| d.request = Some(specifier));
        self.next(false)
    }

    /// Make the request originate from `from_file`.
    ///
    /// Issuer and context change together. Rehoming to the current
    /// `from_file` returns this same view and leaves the record untouched.
    pub fn rehome(self, from_file: impl Into<String>) -> Self {
        let from_file = from_file.into();
        if from_file == self.from_file {
            return self;
        }
        trace!(from = %self.from_file, to = %from_file, "rehome");
        let context = directory_of(&from_file);
        self.handle.update(|d| {
            d.context_info.issuer = Some(from_file);
            d.context = Some(context);
        });
        self.next(self.is_virtual)
    }

    /// Route the request to the virtual loader for `filename`.
    pub fn virtualize(self, filename: &str) -> Self {
        let specifier = encode_virtual_specifier(filename, &self.app_root);
        let mut next = self.alias(specifier);
        next.is_virtual = true;
        next
    }

    /// Put back an issuer the host lost, leaving `context` alone.
    ///
    /// Only valid when `context` is already the issuer's directory.
    pub(crate) fn restore_issuer(self, issuer: String) -> Self {
        trace!(issuer = %issuer, "restoring issuer");
        self.handle.update(|d| d.context_info.issuer = Some(issuer));
        self.next(self.is_virtual)
    }

    /// Replace the metadata mapping.
    pub fn with_meta(self, meta: Meta) -> Self {
        self.handle.update(|d| d.context_info.meta = Some(meta));
        self.next(self.is_virtual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ResolveData;
    use serde_json::json;

    fn request(data: ResolveData) -> Request {
        Request::from_handle(ResolveDataHandle::new(data), "/app").unwrap()
    }

    #[test]
    fn test_missing_fields_is_no_request() {
        let no_context = ResolveData {
            request: Some("./a".to_string()),
            ..ResolveData::default()
        };
        assert!(Request::from_handle(ResolveDataHandle::new(no_context), "/app").is_none());

        let no_request = ResolveData {
            context: Some("/app".to_string()),
            ..ResolveData::default()
        };
        assert!(Request::from_handle(ResolveDataHandle::new(no_request), "/app").is_none());
    }

    #[test]
    fn test_snapshot_fields() {
        let req = request(ResolveData::new("./a", "/app").with_issuer("/app/index.js"));
        assert_eq!(req.specifier(), "./a");
        assert_eq!(req.from_file(), "/app/index.js");
        assert!(req.meta().is_none());
        assert!(!req.is_virtual());
    }

    #[test]
    fn test_alias_leaves_earlier_view_alone() {
        let first = request(ResolveData::new("my-addon", "/app").with_issuer("/app/index.js"));
        let second = first.clone().alias("@scope/my-addon");

        assert_eq!(first.specifier(), "my-addon");
        assert_eq!(second.specifier(), "@scope/my-addon");
        assert_eq!(second.handle().request().as_deref(), Some("@scope/my-addon"));
    }

    #[test]
    fn test_rehome_moves_issuer_and_context_together() {
        let req = request(ResolveData::new("./b", "/app").with_issuer("/app/index.js"));
        let moved = req.rehome("/pkg/lib/a.js");

        assert_eq!(moved.from_file(), "/pkg/lib/a.js");
        let data = moved.handle().snapshot();
        assert_eq!(data.context_info.issuer.as_deref(), Some("/pkg/lib/a.js"));
        assert_eq!(data.context.as_deref(), Some("/pkg/lib"));
    }

    #[test]
    fn test_rehome_same_file_is_noop() {
        let req = request(ResolveData::new("./b", "/app").with_issuer("/app/index.js"));
        let before = req.handle().generation();

        let once = req.rehome("/pkg/a.js");
        let after_first = once.handle().generation();
        let twice = once.rehome("/pkg/a.js");

        assert_eq!(after_first, before + 1);
        assert_eq!(twice.handle().generation(), after_first);
        assert_eq!(twice.from_file(), "/pkg/a.js");
    }

    #[test]
    fn test_virtualize() {
        let req = request(ResolveData::new("#entry", "/app").with_issuer("/app/index.js"));
        let virt = req.virtualize("/app/assets/app.js");

        assert!(virt.is_virtual());
        assert_eq!(
            virt.specifier(),
            "!@embroider/webpack/src/virtual-loader?f=%2Fapp%2Fassets%2Fapp.js&a=%2Fapp!"
        );
        assert_eq!(virt.handle().request().as_deref(), Some(virt.specifier()));
    }

    #[test]
    fn test_with_meta() {
        let req = request(ResolveData::new("./a", "/app"));
        let meta = json!({"resolvedWith": "rules"}).as_object().cloned().unwrap();
        let next = req.clone().with_meta(meta.clone());

        assert!(req.meta().is_none());
        assert_eq!(next.meta(), Some(&meta));
    }

    #[test]
    fn test_alias_does_not_touch_context() {
        let req = request(ResolveData::new("./a", "/app").with_issuer("/app/index.js"));
        let next = req.alias("./b");
        assert_eq!(next.handle().context().as_deref(), Some("/app"));
        assert_eq!(next.from_file(), "/app/index.js");
    }
}
