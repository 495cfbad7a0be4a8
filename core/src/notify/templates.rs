// orderflow/src/notify/templates.rs

//! Fixed message templates, one per notification kind.

use std::fmt::Write as _;

use super::{NotificationKind, NotificationRequest};
use crate::links::{ActionLinks, RemoteAction};
use crate::model::order::short_id;

/// Store-wide values every template needs.
#[derive(Debug, Clone)]
pub struct TemplateContext {
  pub store_name: String,
  pub currency: String,
}

/// One composed customer message, ready for either channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
  pub subject: String,
  pub text: String,
  pub html: String,
  pub whatsapp: String,
}

/// `123456` cents -> `$1,234.56 MXN`.
pub fn format_money(cents: i64, currency: &str) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let abs = cents.unsigned_abs();
  let units = (abs / 100).to_string();
  let mut grouped = String::with_capacity(units.len() + units.len() / 3);
  for (i, ch) in units.chars().enumerate() {
    if i > 0 && (units.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(ch);
  }
  format!("{}${}.{:02} {}", sign, grouped, abs % 100, currency)
}

pub fn escape_html(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  for ch in raw.chars() {
    match ch {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(ch),
    }
  }
  out
}

fn text_to_html(text: &str) -> String {
  text
    .split("\n\n")
    .map(|para| format!("<p>{}</p>", escape_html(para).replace('\n', "<br>")))
    .collect::<Vec<_>>()
    .join("\n")
}

fn items_block(req: &NotificationRequest, ctx: &TemplateContext) -> String {
  let mut out = String::new();
  for item in &req.items {
    let _ = write!(out, "- {} x {}", item.quantity, item.name);
    if let Some(variant) = item.variant.as_deref().filter(|v| !v.is_empty()) {
      let _ = write!(out, " ({})", variant);
    }
    let _ = writeln!(out, ": {}", format_money(item.total_price_cents, &ctx.currency));
  }
  out
}

fn totals_block(req: &NotificationRequest, ctx: &TemplateContext) -> String {
  let shipping = if req.totals.shipping_cents == 0 {
    "Free".to_string()
  } else {
    format_money(req.totals.shipping_cents, &ctx.currency)
  };
  format!(
    "Subtotal: {}\nShipping: {}\nTotal: {}",
    format_money(req.totals.subtotal_cents, &ctx.currency),
    shipping,
    format_money(req.totals.total_cents, &ctx.currency)
  )
}

fn reference_line(req: &NotificationRequest) -> Option<String> {
  req
    .payment_reference
    .as_deref()
    .filter(|r| !r.is_empty())
    .map(|r| format!("Payment reference: {} (include it with your payment)", r))
}

/// Customer-facing message for `kind`.
pub fn compose(kind: NotificationKind, req: &NotificationRequest, ctx: &TemplateContext) -> Rendered {
  let short = short_id(&req.order_id);
  let name = req.customer_name.trim();
  let total = format_money(req.totals.total_cents, &ctx.currency);

  let (subject, text, whatsapp) = match kind {
    NotificationKind::OrderCreated => {
      let mut text = format!(
        "Hi {},\n\nThank you for your order #{} at {}.\n\n{}\n{}",
        name,
        short,
        ctx.store_name,
        items_block(req, ctx).trim_end(),
        totals_block(req, ctx)
      );
      if let Some(line) = reference_line(req) {
        let _ = write!(text, "\n\n{}", line);
      }
      text.push_str("\n\nWe will let you know as soon as your payment is confirmed.");
      let whatsapp = format!(
        "Hi {}! We received your order #{} for {}. We will confirm as soon as your payment arrives.",
        name, short, total
      );
      (format!("{}: order #{} received", ctx.store_name, short), text, whatsapp)
    }
    NotificationKind::PaymentConfirmed => {
      let text = format!(
        "Hi {},\n\nWe received your payment of {} for order #{}. Your order is now being prepared.\n\nThank you for shopping at {}.",
        name, total, short, ctx.store_name
      );
      let whatsapp = format!(
        "Hi {}! Your payment of {} for order #{} is confirmed. We are preparing your package.",
        name, total, short
      );
      (format!("{}: payment confirmed for order #{}", ctx.store_name, short), text, whatsapp)
    }
    NotificationKind::OrderShipped => {
      let tracking = req
        .tracking_number
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(|t| format!(" Tracking number: {}.", t))
        .unwrap_or_default();
      let text = format!(
        "Hi {},\n\nYour order #{} is on its way.{}\n\nThank you for shopping at {}.",
        name, short, tracking, ctx.store_name
      );
      let whatsapp = format!("Hi {}! Your order #{} has shipped.{}", name, short, tracking);
      (format!("{}: order #{} shipped", ctx.store_name, short), text, whatsapp)
    }
    NotificationKind::FirstReminder => {
      let mut text = format!(
        "Hi {},\n\nYour order #{} for {} is still waiting for payment.",
        name, short, total
      );
      if let Some(line) = reference_line(req) {
        let _ = write!(text, "\n\n{}", line);
      }
      text.push_str("\n\nIf you already paid, just reply to this message with your receipt.");
      let whatsapp = format!(
        "Hi {}! Friendly reminder: order #{} ({}) is still awaiting payment.",
        name, short, total
      );
      (format!("{}: order #{} awaiting payment", ctx.store_name, short), text, whatsapp)
    }
    NotificationKind::UrgentReminder => {
      let mut text = format!(
        "Hi {},\n\nWe have not received payment for order #{} ({}). The order will be cancelled soon unless payment arrives.",
        name, short, total
      );
      if let Some(line) = reference_line(req) {
        let _ = write!(text, "\n\n{}", line);
      }
      let whatsapp = format!(
        "Hi {}! Order #{} ({}) will be cancelled soon unless we receive your payment.",
        name, short, total
      );
      (format!("{}: last reminder for order #{}", ctx.store_name, short), text, whatsapp)
    }
  };

  Rendered {
    html: text_to_html(&text),
    subject,
    text,
    whatsapp,
  }
}

/// Operator message for a new order, carrying the remote action links.
pub fn operator_new_order(req: &NotificationRequest, ctx: &TemplateContext, links: &ActionLinks) -> String {
  let mut text = format!(
    "New order #{}\nCustomer: {}",
    short_id(&req.order_id),
    req.customer_name.trim()
  );
  if let Some(phone) = req.customer_phone.as_deref() {
    let _ = write!(text, " ({})", phone);
  }
  let _ = write!(text, "\n\n{}{}", items_block(req, ctx), totals_block(req, ctx));
  if let Some(method) = req.payment_method {
    let _ = write!(text, "\nPayment: {}", method.label());
  }
  if let Some(reference) = req.payment_reference.as_deref() {
    let _ = write!(text, " ({})", reference);
  }
  let _ = write!(
    text,
    "\n\nConfirm payment: {}\nMark shipped: {}\nCancel: {}\nView: {}",
    links.url(req.order_id, RemoteAction::ConfirmPayment),
    links.url(req.order_id, RemoteAction::MarkShipped),
    links.url(req.order_id, RemoteAction::CancelConfirm),
    links.url(req.order_id, RemoteAction::View)
  );
  text
}
