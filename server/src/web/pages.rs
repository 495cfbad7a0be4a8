// storefront_app/src/web/pages.rs

//! Minimal HTML for the remote action pages. Operators open these from a phone, so the
//! markup is a single self-contained document with inline styles.

use orderflow::notify::format_money;
use orderflow::notify::templates::escape_html;
use orderflow::remote::{ActionPage, PageVariant};

fn accent(variant: PageVariant) -> &'static str {
  match variant {
    PageVariant::Success => "#1f7a3a",
    PageVariant::Error => "#b3261e",
    PageVariant::Info => "#1a5fb4",
    PageVariant::Warning => "#9a6700",
  }
}

pub fn render_action_page(page: &ActionPage, store_name: &str, currency: &str) -> String {
  let mut body = format!(
    "<h1>{}</h1>\n<p>{}</p>\n",
    escape_html(&page.title),
    escape_html(&page.message)
  );

  if let Some(order) = &page.order {
    body.push_str("<table>\n");
    let rows = [
      ("Order", format!("#{}", order.short_id)),
      ("Customer", order.customer_name.clone()),
      ("Payment", order.payment_status.as_str().to_string()),
      ("Status", order.order_status.as_str().to_string()),
      ("Total", format_money(order.total_cents, currency)),
    ];
    for (label, value) in rows {
      body.push_str(&format!("<tr><th>{}</th><td>{}</td></tr>\n", label, escape_html(&value)));
    }
    if let Some(tracking) = &order.tracking_number {
      body.push_str(&format!("<tr><th>Tracking</th><td>{}</td></tr>\n", escape_html(tracking)));
    }
    body.push_str("</table>\n");
  }

  if let Some(link) = &page.continue_link {
    body.push_str(&format!(
      "<p><a class=\"button\" href=\"{}\">{}</a></p>\n",
      escape_html(&link.url),
      escape_html(&link.label)
    ));
  }

  format!(
    "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
     <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
     <title>{title} | {store}</title>\n\
     <style>body{{font-family:sans-serif;max-width:32rem;margin:2rem auto;padding:0 1rem}}\
     h1{{color:{accent}}}th{{text-align:left;padding-right:1rem}}\
     .button{{display:inline-block;padding:.6rem 1.2rem;background:{accent};color:#fff;text-decoration:none;border-radius:4px}}</style>\n\
     </head>\n<body class=\"{variant:?}\">\n{body}<footer><small>{store}</small></footer>\n</body>\n</html>\n",
    title = escape_html(&page.title),
    store = escape_html(store_name),
    accent = accent(page.variant),
    variant = page.variant,
    body = body,
  )
}
