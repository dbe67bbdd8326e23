//! Event announcement email rendering.
//!
//! A pure function from event fields to HTML markup; the broadcast
//! pipeline treats it as an opaque collaborator.

use chrono::{DateTime, Utc};

/// Fields rendered into the announcement email.
#[derive(Debug, Clone)]
pub struct EventEmailFields {
    pub title: String,
    pub details: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub location_name: String,
    pub location_address: String,
}

/// Escape text for interpolation into HTML.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Render the new-event announcement email.
pub fn render_event_email(fields: &EventEmailFields) -> String {
    let title = escape_html(&fields.title);
    let details = escape_html(&fields.details);
    let location_name = escape_html(&fields.location_name);
    let location_address = escape_html(&fields.location_address);
    let starts_at = fields.starts_at.format("%B %-d, %Y %-I:%M %p UTC");
    let ends_at = fields.ends_at.format("%B %-d, %Y %-I:%M %p UTC");

    format!(
        r#"<html>
  <head>
    <style>
      body {{ font-family: Arial, sans-serif; color: #333; line-height: 1.6; }}
      .container {{ max-width: 600px; margin: 0 auto; background-color: #f9f9f9; padding: 20px; border: 1px solid #ddd; border-radius: 5px; }}
      .header h1 {{ color: #4CAF50; text-align: center; }}
      .event-details {{ background-color: #fff; padding: 10px; border: 1px solid #ddd; margin: 10px 0; border-radius: 5px; }}
      .event-details h3 {{ color: #4CAF50; }}
      .footer {{ text-align: center; margin-top: 20px; font-size: 12px; color: #999; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>New Event: {title}</h1>
      </div>
      <div class="content">
        <p>Dear member,</p>
        <p>We are excited to announce a new event! Below are the details:</p>
        <div class="event-details">
          <h3>Event Details:</h3>
          <p><strong>Event:</strong> {title}</p>
          <p><strong>Details:</strong> {details}</p>
          <p><strong>Start Time:</strong> {starts_at}</p>
          <p><strong>End Time:</strong> {ends_at}</p>
          <p><strong>Location:</strong> {location_name}, {location_address}</p>
        </div>
        <p>We look forward to seeing you at the event!</p>
      </div>
      <div class="footer">
        <p>&copy; Clubhouse. All rights reserved.</p>
      </div>
    </div>
  </body>
</html>
"#
    )
}

/// Render a minimal notification email for direct user messages.
pub fn render_notification_email(title: &str, body: &str) -> String {
    format!(
        "<html><body><h2>{}</h2><p>{}</p></body></html>\n",
        escape_html(title),
        escape_html(body)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fields() -> EventEmailFields {
        EventEmailFields {
            title: "Sunrise Run".to_string(),
            details: "Easy 5k along the river".to_string(),
            starts_at: Utc.with_ymd_and_hms(2025, 6, 14, 14, 0, 0).unwrap(),
            ends_at: Utc.with_ymd_and_hms(2025, 6, 14, 15, 30, 0).unwrap(),
            location_name: "Riverfront Park".to_string(),
            location_address: "100 Park Ave".to_string(),
        }
    }

    #[test]
    fn test_render_includes_fields() {
        let html = render_event_email(&fields());
        assert!(html.contains("Sunrise Run"));
        assert!(html.contains("Easy 5k along the river"));
        assert!(html.contains("Riverfront Park"));
        assert!(html.contains("June 14, 2025"));
    }

    #[test]
    fn test_render_escapes_html() {
        let mut f = fields();
        f.title = "<script>alert(1)</script>".to_string();
        let html = render_event_email(&f);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
