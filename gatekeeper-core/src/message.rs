//! Approval email rendering
//!
//! The approval email is a fixed template with an HTML and a plain-text
//! alternative. Everything interpolated into the HTML body is escaped.

use serde::{Deserialize, Serialize};

use crate::address::SenderIdentity;
use crate::{Error, Result};

/// Delivery priority hint carried as `X-Priority` / `Importance` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// Value for the `X-Priority` header
    pub fn x_priority(&self) -> &'static str {
        match self {
            Priority::High => "1",
            Priority::Normal => "3",
            Priority::Low => "5",
        }
    }

    /// Value for the `Importance` header
    pub fn importance(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// A fully rendered message, ready for any transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub to: String,
    pub from: SenderIdentity,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
    pub priority: Priority,
}

/// Inputs of the approval email template
#[derive(Debug, Clone)]
pub struct ApprovalEmail<'a> {
    pub site_name: &'a str,
    /// Address the administrator account was requested for
    pub requester: Option<&'a str>,
    pub approve_link: &'a str,
    /// Only rendered when present
    pub reject_link: Option<&'a str>,
    /// How long the links stay valid, for the notice in the body
    pub valid_for_hours: u32,
}

impl<'a> ApprovalEmail<'a> {
    /// Subject used when the caller does not supply one
    pub fn default_subject(&self) -> String {
        format!("{} administrator approval", self.site_name)
    }

    /// Check that the links are absolute http(s) URLs
    pub fn validate(&self) -> Result<()> {
        check_link(self.approve_link)?;
        if let Some(reject) = self.reject_link {
            check_link(reject)?;
        }
        Ok(())
    }

    fn requester_label(&self) -> &str {
        self.requester
            .filter(|r| !r.trim().is_empty())
            .unwrap_or("A user")
    }

    pub fn render_text(&self) -> String {
        let mut text = format!(
            "{site} - Administrator Account Approval\n\n\
             Hello,\n\n\
             {requester} has requested an administrator account for {site}.\n\
             To activate the account, open the following link:\n\n\
             {approve}\n\n",
            site = self.site_name,
            requester = self.requester_label(),
            approve = self.approve_link,
        );

        if let Some(reject) = self.reject_link {
            text.push_str(&format!(
                "To reject the request instead, open this link:\n\n{}\n\n",
                reject
            ));
        }

        text.push_str(&format!(
            "This link is valid for {} hours.\n\n\
             If you did not expect this request, you can ignore this email.\n\n\
             This message was sent automatically. Please do not reply.\n",
            self.valid_for_hours
        ));
        text
    }

    pub fn render_html(&self) -> String {
        let site = escape_html(self.site_name);
        let requester = escape_html(self.requester_label());
        let approve = escape_html(self.approve_link);

        let reject_block = match self.reject_link {
            Some(reject) => {
                let reject = escape_html(reject);
                format!(
                    r#"<p>If this request should not be granted:</p>
      <p style="text-align: center;"><a href="{reject}" class="button reject">Reject request</a></p>
      <p style="word-break: break-all; color: #c62828;">{reject}</p>"#
                )
            }
            None => String::new(),
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <style>
    body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
    .header {{ background-color: #2196F3; color: white; padding: 20px; text-align: center; border-radius: 5px 5px 0 0; }}
    .content {{ background-color: #f9f9f9; padding: 30px; border-radius: 0 0 5px 5px; }}
    .button {{ display: inline-block; padding: 12px 30px; background-color: #2196F3; color: white; text-decoration: none; border-radius: 5px; margin: 20px 0; }}
    .button.reject {{ background-color: #c62828; }}
    .footer {{ margin-top: 20px; font-size: 12px; color: #666; text-align: center; }}
  </style>
</head>
<body>
  <div class="header"><h1>{site}</h1></div>
  <div class="content">
    <h2>Administrator Account Approval</h2>
    <p>Hello,</p>
    <p><strong>{requester}</strong> has requested an administrator account for {site}.</p>
    <p>To activate the account, click the button below:</p>
    <p style="text-align: center;"><a href="{approve}" class="button">Approve account</a></p>
    <p>Or paste this link into your browser:</p>
    <p style="word-break: break-all; color: #2196F3;">{approve}</p>
    {reject_block}
    <p>This link is valid for {hours} hours.</p>
    <p>If you did not expect this request, you can ignore this email.</p>
  </div>
  <div class="footer"><p>This message was sent automatically. Please do not reply.</p></div>
</body>
</html>
"#,
            hours = self.valid_for_hours,
        )
    }

    /// Render into a message addressed to `to`
    pub fn into_message(
        &self,
        to: &str,
        from: SenderIdentity,
        reply_to: &str,
        subject: Option<&str>,
    ) -> Result<OutboundMessage> {
        self.validate()?;

        let subject = subject
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.default_subject());

        Ok(OutboundMessage {
            to: to.to_string(),
            from,
            reply_to: reply_to.to_string(),
            subject,
            html: self.render_html(),
            text: self.render_text(),
            priority: Priority::High,
        })
    }
}

fn check_link(link: &str) -> Result<()> {
    let trimmed = link.trim();
    let has_scheme = trimmed.starts_with("https://") || trimmed.starts_with("http://");
    if !has_scheme || trimmed.chars().any(char::is_whitespace) {
        return Err(Error::InvalidLink(link.to_string()));
    }
    Ok(())
}

/// Escape text for inclusion in HTML element content or quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
