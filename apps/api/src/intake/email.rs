//! Referral request email sent to a newly added candidate.

use crate::mailer::OutboundEmail;
use crate::models::candidate::Candidate;

pub const REFERRAL_REQUEST_SUBJECT: &str = "Action required: provide your referral's information";

pub fn referral_link(public_base_url: &str, token: &str) -> String {
    format!("{}/referrals/{}", public_base_url.trim_end_matches('/'), token)
}

pub fn referral_request_email(candidate: &Candidate, link: &str) -> OutboundEmail {
    let name = escape_html(&candidate.full_name);
    let company = candidate
        .company_name
        .as_deref()
        .map(|c| format!(" with <b>{}</b>", escape_html(c)))
        .unwrap_or_default();
    let link = escape_html(link);

    let html = format!(
        r#"<div style="font-family: ui-sans-serif, system-ui; line-height:1.5;">
  <p>Hi {name},</p>
  <p>To continue your onboarding{company}, please provide your referral's details (name, phone number, email).</p>
  <p><a href="{link}">Click here to submit referral information</a></p>
  <p>If the link doesn't work, paste this into your browser:</p>
  <p>{link}</p>
  <p>Thanks!</p>
</div>"#
    );

    OutboundEmail {
        to: candidate.email.clone(),
        subject: REFERRAL_REQUEST_SUBJECT.to_string(),
        html,
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
