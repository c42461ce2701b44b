use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::{ResolutionWarning, WarningReason};
use crate::providers::{Fragment, PlaceholderKind, ProviderRegistry};

// Token grammar: {{KIND_<ordinal>_KIND}}, e.g. {{PRODUCT_BOX_0_PRODUCT_BOX}}.
// Prefix and suffix kind must agree; anything else is plain text and is left
// for the segmenter.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\{\{(PRODUCT_BOX|CTA_BOX|AFFILIATE_LINK|IMAGE_PLACEHOLDER)_(\d+)_(PRODUCT_BOX|CTA_BOX|AFFILIATE_LINK|IMAGE_PLACEHOLDER)\}\}",
    )
    .unwrap()
});

/// Resolution output: the new document version plus everything that went
/// wrong on a per-token basis.
#[derive(Debug)]
pub struct ResolvedDocument {
    pub document: Document,
    pub warnings: Vec<ResolutionWarning>,
}

#[derive(Debug, Clone, Copy)]
struct TokenMatch {
    kind: PlaceholderKind,
    ordinal: u32,
    start: usize,
    end: usize,
}

/// Resolves every placeholder token in `document` against `providers`.
///
/// The document is scanned once, left to right; offsets all come from that
/// single scan, so nothing is spliced until every lookup has completed.
/// Each distinct `(kind, ordinal)` pair is looked up exactly once — if the
/// generator emitted the same token twice, the first occurrence gets the
/// fragment and later copies are stripped. Lookups run concurrently under
/// `concurrency` permits; a failing provider downgrades to a
/// [`ResolutionWarning`] and the token is stripped, never aborting the rest
/// of the document.
///
/// Dropping the returned future aborts any in-flight lookups: nothing keeps
/// running in the background, and no partially resolved document is ever
/// observable because splicing happens only after every lookup settles.
pub async fn resolve(
    document: Document,
    providers: &ProviderRegistry,
    concurrency: usize,
) -> ResolvedDocument {
    let tokens = scan_tokens(document.text());
    if tokens.is_empty() {
        return ResolvedDocument {
            document,
            warnings: Vec::new(),
        };
    }

    // Distinct pairs in first-occurrence order. This is both the dedup that
    // guarantees exactly-once lookups and the order warnings come back in.
    let mut order: Vec<(PlaceholderKind, u32)> = Vec::new();
    let mut seen = HashSet::new();
    for t in &tokens {
        if seen.insert((t.kind, t.ordinal)) {
            order.push((t.kind, t.ordinal));
        }
    }

    // JoinSet rather than detached spawns: dropping it (when this future is
    // dropped) aborts every lookup still in flight.
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut lookups: JoinSet<((PlaceholderKind, u32), Result<Fragment, WarningReason>)> =
        JoinSet::new();

    for &(kind, ordinal) in &order {
        let provider = providers.get(kind);
        let sem = Arc::clone(&semaphore);

        lookups.spawn(async move {
            let _permit = sem.acquire().await.unwrap();
            let outcome = match provider {
                None => Err(WarningReason::NoProvider),
                Some(p) => match p.lookup(ordinal).await {
                    Ok(Some(fragment)) => Ok(fragment),
                    Ok(None) => Err(WarningReason::NotFound),
                    Err(e) => Err(WarningReason::ProviderError(e.to_string())),
                },
            };
            ((kind, ordinal), outcome)
        });
    }

    // Memoization table: every pair gets an entry, resolved or not, so the
    // splice below never consults a provider again.
    let mut memo: HashMap<(PlaceholderKind, u32), Result<Fragment, WarningReason>> =
        HashMap::new();
    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok((pair, outcome)) => {
                memo.insert(pair, outcome);
            }
            Err(e) => warn!("fragment lookup task failed: {}", e),
        }
    }

    // A panicked lookup task never produced an entry; its token still gets a
    // warning and is stripped like any other failure.
    for &(kind, ordinal) in &order {
        memo.entry((kind, ordinal)).or_insert_with(|| {
            Err(WarningReason::ProviderError(
                "lookup task panicked".to_string(),
            ))
        });
    }

    let mut warnings = Vec::new();
    for &(kind, ordinal) in &order {
        if let Some(Err(reason)) = memo.get(&(kind, ordinal)) {
            let warning = ResolutionWarning {
                kind,
                ordinal,
                reason: reason.clone(),
            };
            warn!("unresolved placeholder {}", warning);
            warnings.push(warning);
        }
    }

    let text = document.text();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    let mut spliced: HashSet<(PlaceholderKind, u32)> = HashSet::new();
    for t in &tokens {
        out.push_str(&text[cursor..t.start]);
        // First occurrence gets the fragment; duplicates and unresolvable
        // tokens are stripped so no visual placeholder leaks into output.
        if spliced.insert((t.kind, t.ordinal)) {
            if let Some(Ok(fragment)) = memo.get(&(t.kind, t.ordinal)) {
                out.push_str(fragment);
            }
        }
        cursor = t.end;
    }
    out.push_str(&text[cursor..]);

    debug!(
        tokens = tokens.len(),
        distinct = order.len(),
        warnings = warnings.len(),
        "resolved placeholders"
    );

    ResolvedDocument {
        document: document.replaced(out),
        warnings,
    }
}

fn scan_tokens(text: &str) -> Vec<TokenMatch> {
    TOKEN_RE
        .captures_iter(text)
        .filter_map(|caps| {
            if caps[1] != caps[3] {
                return None; // mismatched prefix/suffix, not a token
            }
            let kind = PlaceholderKind::from_tag(&caps[1])?;
            let ordinal: u32 = caps[2].parse().ok()?;
            let m = caps.get(0).unwrap();
            Some(TokenMatch {
                kind,
                ordinal,
                start: m.start(),
                end: m.end(),
            })
        })
        .collect()
}

// ── Tests ──
