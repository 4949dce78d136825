//! 报表与启动通知邮件渲染
//!
//! 模板中的所有插值都经过 handlebars 默认的 HTML 转义，
//! 日志内容无法向邮件注入标签。

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::error::MailError;
use crate::{MailMessage, resolve_recipients};

/// 报表中的一行
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub tenant: String,
    pub level: String,
    pub ip: String,
    /// 前端用户或后端实例，二者都缺失时为 "No Info"
    pub source: String,
    pub user_agent: String,
    pub message: String,
    pub timestamp: String,
}

/// 启动通知邮件内容
#[derive(Debug, Clone, Serialize)]
pub struct StartupInfo {
    pub instance: String,
    pub start_time: String,
    pub host: String,
    pub version: String,
}

pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, MailError> {
        let mut hb = Handlebars::new();
        hb.set_strict_mode(true);

        hb.register_template_string("report", REPORT_TEMPLATE)?;
        hb.register_template_string("startup", STARTUP_TEMPLATE)?;

        Ok(Self { handlebars: hb })
    }

    /// 渲染日志报表
    ///
    /// 主题为 `Logger Report: {subject}`，正文标题为 `Logger Report {title}`。
    /// 收件人取 `mail_to`（逗号分隔），为空时使用默认收件人。
    pub fn report(
        &self,
        rows: &[ReportRow],
        subject: &str,
        title: &str,
        mail_to: Option<&str>,
        default_mail_to: &str,
    ) -> Result<MailMessage, MailError> {
        let to = resolve_recipients(mail_to, default_mail_to);
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let html = self
            .handlebars
            .render("report", &json!({ "title": title, "rows": rows }))?;

        Ok(MailMessage {
            to,
            subject: format!("Logger Report: {subject}"),
            html,
        })
    }

    /// 渲染启动通知，发往默认收件人
    pub fn startup(&self, info: &StartupInfo, default_mail_to: &str) -> Result<MailMessage, MailError> {
        let to = resolve_recipients(None, default_mail_to);
        if to.is_empty() {
            return Err(MailError::NoRecipients);
        }

        Ok(MailMessage {
            to,
            subject: format!("Logger {} Server starts up", info.instance),
            html: self.handlebars.render("startup", info)?,
        })
    }
}

const REPORT_TEMPLATE: &str = r#"<html>
  <head>
    <style>
    table {
      font-family: arial, sans-serif;
      border-collapse: collapse;
      width: 100%;
    }

    td, th {
      border: 1px solid #dddddd;
      text-align: left;
      padding: 8px;
    }

    tr:nth-child(even) {
      background-color: #dddddd;
    }
    </style>
  </head>
  <body><center>
    <h1>Logger Report {{title}}</h1><br>

    <table>
      <tr>
        <th>tenant</th>
        <th>level</th>
        <th>ip</th>
        <th>PM2/React</th>
        <th>userAgent</th>
        <th>message</th>
        <th>timestamp</th>
      </tr>
      {{#each rows}}
      <tr>
        <td>{{tenant}}</td>
        <td>{{level}}</td>
        <td>{{ip}}</td>
        <td>{{source}}</td>
        <td>{{user_agent}}</td>
        <td>{{message}}</td>
        <td>{{timestamp}}</td>
      </tr>
      {{/each}}
    </table>

    <h4>This is computer-generated report, do NOT reply to this email address</h4>

  </center></body>
</html>
"#;

const STARTUP_TEMPLATE: &str = r#"<strong>Logger Report Server starts up @ {{start_time}}</strong><br>
instance: {{instance}} <br>
version: {{version}} <br>
host: {{host}} <br>
"#;
