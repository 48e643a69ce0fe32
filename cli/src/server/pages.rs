//! HTML pages served by the installer.

use crate::domain::bootstrap::SERVICE_PORT;

const STYLE: &str = r"
body { font-family: -apple-system, Helvetica, Arial, sans-serif; background: #f6f7f9; color: #222; }
#content { max-width: 640px; margin: 64px auto; background: #fff; padding: 32px; border-radius: 6px; }
.btn-success { display: inline-block; background: #29a35a; color: #fff; padding: 10px 18px; border-radius: 4px; text-decoration: none; }
#progress-bar { background: #e4e6ea; height: 8px; border-radius: 4px; overflow: hidden; }
#current-progress { background: #29a35a; height: 100%; width: 0; transition: width 1s; }
#core-info { display: none; margin-top: 24px; }
#client-token { display: block; word-break: break-all; margin-bottom: 16px; }
.failed #current-progress { background: #c0392b; }
";

/// Minimal HTML attribute/text escaping.
#[must_use]
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

/// Landing page with the install link.
#[must_use]
pub fn index(install_link: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
  <head>
    <title>One-Click Chain Core DigitalOcean</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <div id="content">
      <p>Install Chain Core on a DigitalOcean droplet. This installer creates a new 1gb droplet and a 100gb block storage volume on your DigitalOcean account, and runs Chain Core on the droplet using the attached volume for storage.</p>
      <a href="{link}" class="btn-success" id="install-btn">Install Chain Core</a>
    </div>
  </body>
</html>
"##,
        link = escape(install_link),
    )
}

/// Progress page for one job. Polls `/status/{id}` once a second until the
/// job is terminal.
#[must_use]
pub fn progress(job_id: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html>
  <head>
    <title>One-Click Chain Core DigitalOcean</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <div id="content" data-install-id="{id}">
      <div id="progress-bar"><div id="current-progress"></div></div>
      <p id="status-line">Initializing droplet&hellip;</p>
      <div id="core-info">
        <code id="client-token"></code>
        <a href="#" class="btn-success" id="open-dashboard">Open dashboard</a>
      </div>
    </div>
    <script>
      (function () {{
        var content = document.getElementById("content");
        var id = content.getAttribute("data-install-id");
        var steps = {{
          pending_auth: ["Waiting for authorization…", 5],
          provisioning: ["Provisioning droplet…", 10],
          waiting_for_shell: ["Waiting for SSH…", 20],
          waiting_for_service: ["Waiting for Chain Core…", 45],
          extracting_token: ["Creating client token…", 95]
        }};
        function show(text, pct) {{
          document.getElementById("status-line").textContent = text;
          document.getElementById("current-progress").style.width = pct + "%";
        }}
        function poll() {{
          fetch("/status/" + id).then(function (r) {{ return r.json(); }}).then(function (job) {{
            if (job.state === "done") {{
              show("Install complete", 100);
              document.getElementById("client-token").textContent = job.client_token;
              document.getElementById("open-dashboard").href =
                "http://" + job.client_token + "@" + job.ip_address + ":{port}/dashboard";
              document.getElementById("core-info").style.display = "block";
              return;
            }}
            if (job.state === "failed") {{
              content.className = "failed";
              show("Install failed: " + job.reason, 100);
              return;
            }}
            var step = steps[job.state] || [job.state, 0];
            show(step[0], step[1]);
            setTimeout(poll, 1000);
          }}).catch(function () {{ setTimeout(poll, 1000); }});
        }}
        poll();
      }})();
    </script>
  </body>
</html>
"##,
        id = escape(job_id),
        port = SERVICE_PORT,
    )
}
