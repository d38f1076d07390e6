//! The per-candidate assembly state machine.
//!
//! `Admitted? → CreativeMatched? → TemplateRendered → ChannelURLBuilt? →
//! CountersUpdated → ASSEMBLED`, with every `?` stage dropping the candidate
//! on failure. No candidate's failure aborts the batch; side effects commit
//! independently per candidate and only after it reaches ASSEMBLED.

use std::borrow::Cow;
use std::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::assemble::types::{AdCandidate, AdFormat, AdRequest, AssembledAd, BatchResult, DropReason};
use crate::context::Context;
use crate::creative::pool::RenderFallback;
use crate::creative::{match_icon, match_image, match_video, Creative};
use crate::guard::{CounterNamespace, FrequencyCounters, PacingState};
use crate::template::{render, EMPTY_TEMPLATE};

/// Orchestrates candidate assembly against the shared state owned by a
/// [`Context`]. Cheap to construct per request.
#[derive(Debug, Clone)]
pub struct Assembler {
  ctx: Context,
}

impl Assembler {
  pub fn new(ctx: Context) -> Self {
    Self { ctx }
  }

  /// Runs the state machine over a ranked candidate list and returns every
  /// candidate that reached ASSEMBLED, in input order, plus the rejection
  /// reasons for the rest.
  ///
  /// The pacing snapshot and the frequency snapshot are captured once up
  /// front and reused for the whole batch. Cancellation is checked between
  /// candidates; a cancelled batch stops processing, keeps whatever was
  /// already assembled (committed side effects stand), and reports the
  /// unprocessed candidates as cancelled drops.
  pub async fn assemble_batch(
    &self,
    request: &AdRequest,
    candidates: &[AdCandidate],
    cancel: &CancellationToken,
  ) -> BatchResult {
    let pacing = self.ctx.pacing().snapshot();
    let frequency = self
      .ctx
      .frequency()
      .fetch(CounterNamespace::Exposure, &request.user_id, &request.ad_type)
      .await;
    let fallback = self.ctx.render_fallback();

    let mut result = BatchResult::default();
    for (idx, candidate) in candidates.iter().enumerate() {
      if cancel.is_cancelled() {
        trace!(slot = %request.slot_id, remaining = candidates.len() - idx, "batch abandoned before candidate processing");
        result
          .dropped
          .extend(candidates[idx..].iter().map(|c| (c.id, DropReason::Cancelled)));
        break;
      }
      match self.assemble_one(request, candidate, &frequency, &pacing, &fallback) {
        Ok(ad) => {
          // Commit-on-success: write-backs are per-candidate and are not
          // rolled back if a later candidate fails.
          self.ctx.frequency().commit(
            CounterNamespace::Exposure,
            &request.user_id,
            &request.ad_type,
            candidate.package_name.clone(),
          );
          pacing.add(candidate.id, &request.country, 1);
          result.ads.push(ad);
        }
        Err(reason) => result.dropped.push((candidate.id, reason)),
      }
    }
    debug!(
      slot = %request.slot_id,
      assembled = result.ads.len(),
      dropped = result.dropped.len(),
      "batch assembly finished"
    );
    result
  }

  fn admit(
    &self,
    request: &AdRequest,
    candidate: &AdCandidate,
    frequency: &FrequencyCounters,
    pacing: &PacingState,
  ) -> Result<(), DropReason> {
    let decision = frequency.in_cap(&candidate.package_name, candidate.freq_limit, request.freq_exempt);
    if !decision.allowed {
      trace!(ad_id = candidate.id, package = %candidate.package_name, "frequency cap reached");
      return Err(DropReason::FrequencyCapped);
    }
    if candidate.user_freq_limit > 0 && !frequency.user_cap(candidate.user_freq_limit) {
      trace!(ad_id = candidate.id, "user-level frequency cap reached");
      return Err(DropReason::FrequencyCapped);
    }
    if pacing.over_cap(candidate.id, &request.country, candidate.pacing_rate) {
      trace!(ad_id = candidate.id, country = %request.country, "pacing cap reached");
      return Err(DropReason::PacingCapped);
    }
    Ok(())
  }

  fn assemble_one(
    &self,
    request: &AdRequest,
    candidate: &AdCandidate,
    frequency: &FrequencyCounters,
    pacing: &PacingState,
    fallback: &RenderFallback,
  ) -> Result<AssembledAd, DropReason> {
    self.admit(request, candidate, frequency, pacing)?;

    let mut creative_ids: Vec<u64> = Vec::new();

    // Mandatory creative slots per format. A native ad without an icon or a
    // video ad without a video variant is not renderable at all.
    let icon = match candidate.format {
      AdFormat::Native => match match_icon(&candidate.creatives, &request.language) {
        Some(found) => Some(found),
        None => {
          trace!(ad_id = candidate.id, "no icon variant for native candidate");
          return Err(DropReason::NoCreative);
        }
      },
      _ => None,
    };
    let primary: Cow<'_, Creative> = match candidate.format {
      AdFormat::Video => match match_video(
        &candidate.creatives,
        &request.language,
        request.width,
        request.height,
      ) {
        Some(found) => Cow::Borrowed(found),
        None => {
          trace!(ad_id = candidate.id, "no video variant matches orientation");
          return Err(DropReason::NoCreative);
        }
      },
      _ => match match_image(
        &candidate.creatives,
        fallback,
        &request.language,
        request.width,
        request.height,
        request.policy,
      ) {
        Some(found) => found,
        None => {
          trace!(ad_id = candidate.id, "no image variant satisfies policy");
          return Err(DropReason::NoCreative);
        }
      },
    };

    let stream = match self.ctx.templates().tokenize(&candidate.template_b64) {
      Ok(stream) => stream,
      Err(e) => {
        // Data fault, not a drop: the client still gets a structurally
        // valid payload rendered from the empty template.
        warn!(ad_id = candidate.id, error = %e, "template decode failed, using empty template");
        EMPTY_TEMPLATE.clone()
      }
    };

    let mut bindings = candidate.bindings.clone();
    if let Some(icon) = icon {
      creative_ids.push(icon.id);
      let url = icon.cdn_url(request.overseas).to_string();
      bindings.entry("{$g_icon}".to_string()).or_insert_with(|| url.clone());
      bindings.entry("{$icon}".to_string()).or_insert(url);
    }
    creative_ids.push(primary.id);

    let html = {
      let pool = &candidate.creatives;
      let chosen = &mut creative_ids;
      render(&stream, &bindings, |width, height| {
        match_image(pool, fallback, &request.language, width, height, request.policy).map(|c| {
          chosen.push(c.id);
          c.cdn_url(request.overseas).to_string()
        })
      })
    };

    let strategy = match self.ctx.channels().get(&candidate.channel) {
      Some(strategy) => strategy,
      None => {
        warn!(ad_id = candidate.id, channel = %candidate.channel, "no strategy registered for channel");
        return Err(DropReason::UnknownChannel);
      }
    };

    Ok(AssembledAd {
      id: candidate.id,
      impression_id: new_impression_id(),
      landing_type: candidate.landing_type,
      click_url: strategy.click_url(candidate, request),
      impression_tracking_urls: strategy.impression_trackers(candidate, request),
      click_tracking_urls: strategy.click_trackers(candidate, request),
      creative_html_b64: STANDARD.encode(&html),
      creative_ids,
    })
  }
}

fn new_impression_id() -> String {
  let bytes: [u8; 16] = rand::random();
  let mut out = String::with_capacity(32);
  for b in bytes {
    let _ = write!(out, "{b:02x}");
  }
  out
}
