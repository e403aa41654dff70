use axum::{response::Html, routing::get, Router};

pub fn router() -> Router {
    Router::new().route("/", get(index))
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r##"<!doctype html>
<html lang="en" data-bs-theme="light">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>LaTeX Lab</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css" />
  <style>
    body { margin: 2rem; }
    textarea { font-family: monospace; }
    .mathjax-wrapper { overflow-x: auto; }
    .region { min-height: 2rem; }
    .card { margin-bottom: 1rem; }
    #plotArea svg { max-width: 100%; }
  </style>
  <script>
    window.MathJax = {
      tex: {
        inlineMath: [['\\(', '\\)']],
        displayMath: [['\\[', '\\]']],
        processEscapes: true
      },
      options: { skipHtmlTags: ['script', 'noscript', 'style', 'textarea', 'pre', 'code'] }
    };
  </script>
  <script src="https://cdn.jsdelivr.net/npm/mathjax@3/es5/tex-mml-chtml.js" async></script>
  <script src="https://cdn.jsdelivr.net/npm/d3@3.5.17/d3.min.js"></script>
  <script src="https://cdn.jsdelivr.net/npm/function-plot@1.25.1/dist/function-plot.js"></script>
</head>
<body>
  <div class="d-flex justify-content-between align-items-center mb-3">
    <h1 class="h3 mb-0">LaTeX Lab</h1>
    <button id="themeBtn" class="btn btn-outline-secondary btn-sm">Toggle theme</button>
  </div>

  <div class="card"><div class="card-body">
    <label for="editor" class="form-label fw-semibold">LaTeX</label>
    <textarea id="editor" class="form-control" rows="4" placeholder="x^2 + 2x + 1"></textarea>
    <div class="mt-2 d-flex flex-wrap gap-1">
      <button class="btn btn-light btn-sm snippet" data-snippet="\frac{}{}">frac</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="\sqrt{}">sqrt</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="^{}">power</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="\sin">sin</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="\cos">cos</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="\ln">ln</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="e^{}">exp</button>
      <button class="btn btn-light btn-sm snippet" data-snippet="\pi">pi</button>
    </div>
    <div id="preview" class="region mt-3"></div>
  </div></div>

  <div class="card"><div class="card-body">
    <h2 class="h5">Operations</h2>
    <div class="row g-2">
      <div class="col-md-3">
        <label for="variable" class="form-label">Variable</label>
        <input id="variable" class="form-control" value="x" />
      </div>
      <div class="col-md-6">
        <label for="parameter" class="form-label">Substitution (e.g. x=2; y=3)</label>
        <input id="parameter" class="form-control" />
      </div>
      <div class="col-md-3 d-flex align-items-end">
        <div class="form-check">
          <input id="replaceEditor" class="form-check-input" type="checkbox" />
          <label for="replaceEditor" class="form-check-label">Replace editor</label>
        </div>
      </div>
    </div>
    <div class="mt-2 d-flex flex-wrap gap-1">
      <button class="btn btn-primary btn-sm op" data-op="simplify">Simplify</button>
      <button class="btn btn-primary btn-sm op" data-op="differentiate">Differentiate</button>
      <button class="btn btn-primary btn-sm op" data-op="integrate">Integrate</button>
      <button class="btn btn-primary btn-sm op" data-op="solve">Solve</button>
      <button class="btn btn-primary btn-sm op" data-op="factor">Factor</button>
      <button class="btn btn-primary btn-sm op" data-op="expand">Expand</button>
      <button class="btn btn-primary btn-sm op" data-op="substitute">Substitute</button>
      <button class="btn btn-primary btn-sm op" data-op="evaluate">Evaluate</button>
    </div>
    <div id="result" class="region mt-3"></div>
  </div></div>

  <div class="card"><div class="card-body">
    <h2 class="h5">Plot</h2>
    <textarea id="plotInput" class="form-control" rows="3" placeholder="One function per line"></textarea>
    <div class="row g-2 mt-1">
      <div class="col"><input id="plotVariable" class="form-control" value="x" placeholder="variable" /></div>
      <div class="col"><input id="xMin" class="form-control" placeholder="x min" /></div>
      <div class="col"><input id="xMax" class="form-control" placeholder="x max" /></div>
      <div class="col"><input id="yMin" class="form-control" placeholder="y min" /></div>
      <div class="col"><input id="yMax" class="form-control" placeholder="y max" /></div>
    </div>
    <div class="mt-2">
      <label class="me-3"><input id="plotLegend" type="checkbox" /> Legend</label>
      <label class="me-3"><input id="plotGrid" type="checkbox" checked /> Grid</label>
      <button id="plotBtn" class="btn btn-success btn-sm">Plot</button>
    </div>
    <div id="plotArea" class="mt-3"></div>
    <div id="plotMessages" class="region"></div>
  </div></div>

  <div class="card"><div class="card-body">
    <h2 class="h5">Ask the model</h2>
    <textarea id="question" class="form-control" rows="2" placeholder="What does this formula describe?"></textarea>
    <button id="askBtn" class="btn btn-info btn-sm mt-2">Ask</button>
    <div id="answer" class="region mt-3"></div>
  </div></div>

  <div class="card"><div class="card-body">
    <h2 class="h5">API settings</h2>
    <div class="row g-2">
      <div class="col-md-5"><input id="apiEndpoint" class="form-control" placeholder="Endpoint" /></div>
      <div class="col-md-3"><input id="apiModel" class="form-control" placeholder="Model" /></div>
      <div class="col-md-4"><input id="apiKey" type="password" class="form-control" placeholder="API key" /></div>
    </div>
    <button id="saveSettingsBtn" class="btn btn-secondary btn-sm mt-2">Save</button>
    <button id="resetSettingsBtn" class="btn btn-outline-danger btn-sm mt-2">Reset</button>
    <div id="settingsStatus" class="region mt-2"></div>
  </div></div>

  <script>
    const $ = (id) => document.getElementById(id);
    const editor = $('editor');

    // Each region keeps the tag of its latest request; older responses are dropped.
    const tags = {};
    function nextTag(region) {
      tags[region] = (tags[region] || 0) + 1;
      return tags[region];
    }
    function isCurrent(region, tag) {
      return tags[region] === tag;
    }

    function typeset(el) {
      if (window.MathJax && MathJax.typesetPromise) {
        MathJax.typesetPromise([el]).catch((err) => {
          el.insertAdjacentHTML('beforeend',
            '<div class="alert alert-warning mt-2">Problem while typesetting formulas: ' + err.message + '</div>');
        });
      }
    }

    function show(region, html) {
      const el = $(region);
      el.innerHTML = html;
      typeset(el);
    }

    function loading(region, text) {
      $(region).innerHTML = '<div class="alert alert-info mt-2"><span class="spinner-border spinner-border-sm me-2"></span>' + text + '</div>';
    }

    async function post(url, body) {
      const res = await fetch(url, {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify(body)
      });
      return res.json();
    }

    function failed(region, err) {
      show(region, '<div class="error-message alert alert-danger mt-2">Request failed: ' + err.message + '</div>');
    }

    let previewTimer = null;
    editor.addEventListener('input', () => {
      clearTimeout(previewTimer);
      previewTimer = setTimeout(async () => {
        const tag = nextTag('preview');
        try {
          const json = await post('/api/preview', { latex: editor.value });
          if (isCurrent('preview', tag)) show('preview', json.html);
        } catch (err) {
          if (isCurrent('preview', tag)) failed('preview', err);
        }
      }, 250);
    });

    document.querySelectorAll('.snippet').forEach((btn) => {
      btn.addEventListener('click', () => {
        const start = editor.selectionStart, end = editor.selectionEnd;
        const text = btn.dataset.snippet;
        editor.value = editor.value.slice(0, start) + text + editor.value.slice(end);
        editor.selectionStart = editor.selectionEnd = start + text.length;
        editor.focus();
        editor.dispatchEvent(new Event('input'));
      });
    });

    function pollExplanation(id) {
      const timer = setInterval(async () => {
        const slot = document.querySelector('[data-explanation-id="' + id + '"]');
        if (!slot) { clearInterval(timer); return; }
        try {
          const res = await fetch('/api/explanations/' + id);
          const json = await res.json();
          if (json.status === 'pending') return;
          clearInterval(timer);
          slot.innerHTML = json.html || '';
          typeset(slot);
        } catch (err) {
          clearInterval(timer);
          slot.innerHTML = '<div class="alert alert-warning mt-2">Could not get a model explanation: ' + err.message + '</div>';
        }
      }, 1000);
    }

    document.querySelectorAll('.op').forEach((btn) => {
      btn.addEventListener('click', async () => {
        const tag = nextTag('result');
        loading('result', 'Computing...');
        const payload = {
          operation: btn.dataset.op,
          formula: editor.value,
          variable: $('variable').value,
          parameter: $('parameter').value || null,
          replaceEditor: $('replaceEditor').checked,
          editor: {
            text: editor.value,
            selectionStart: editor.selectionStart,
            selectionEnd: editor.selectionEnd
          }
        };
        try {
          const json = await post('/api/math', payload);
          if (!isCurrent('result', tag)) return;
          show('result', json.html);
          if (json.editor) {
            editor.value = json.editor.text;
            editor.selectionStart = json.editor.selectionStart;
            editor.selectionEnd = json.editor.selectionEnd;
            editor.dispatchEvent(new Event('input'));
          }
          if (json.explanationId) pollExplanation(json.explanationId);
        } catch (err) {
          if (isCurrent('result', tag)) failed('result', err);
        }
      });
    });

    $('plotBtn').addEventListener('click', async () => {
      const tag = nextTag('plotMessages');
      loading('plotMessages', 'Plotting...');
      const payload = {
        formulas: $('plotInput').value || editor.value,
        variable: $('plotVariable').value,
        legend: $('plotLegend').checked,
        grid: $('plotGrid').checked,
        axes: { xMin: $('xMin').value, xMax: $('xMax').value, yMin: $('yMin').value, yMax: $('yMax').value }
      };
      try {
        const json = await post('/api/plot', payload);
        if (!isCurrent('plotMessages', tag)) return;
        const area = $('plotArea');
        area.innerHTML = '';
        if (json.config) {
          try {
            functionPlot(Object.assign({ target: '#plotArea' }, json.config));
          } catch (err) {
            if (json.svg) area.innerHTML = json.svg;
          }
        }
        show('plotMessages', json.html);
      } catch (err) {
        if (isCurrent('plotMessages', tag)) failed('plotMessages', err);
      }
    });

    $('askBtn').addEventListener('click', async () => {
      const tag = nextTag('answer');
      loading('answer', 'Waiting for the model...');
      try {
        const json = await post('/api/ask', { query: $('question').value, latex: editor.value });
        if (isCurrent('answer', tag)) show('answer', json.html);
      } catch (err) {
        if (isCurrent('answer', tag)) failed('answer', err);
      }
    });

    function fillSettings(s) {
      $('apiEndpoint').value = s.apiEndpoint;
      $('apiModel').value = s.model;
      $('apiKey').value = '';
      $('apiKey').placeholder = s.hasKey ? 'API key (' + s.keyHint + ')' : 'API key';
    }

    async function loadSettings() {
      const res = await fetch('/api/settings');
      fillSettings(await res.json());
    }

    $('saveSettingsBtn').addEventListener('click', async () => {
      const json = await post('/api/settings', {
        apiEndpoint: $('apiEndpoint').value,
        model: $('apiModel').value,
        apiKey: $('apiKey').value
      });
      if (json.success) {
        fillSettings(json.settings);
        $('settingsStatus').innerHTML = '<div class="alert alert-success mt-2">' + json.message + '</div>';
      } else {
        $('settingsStatus').innerHTML = '<div class="alert alert-warning mt-2">' + (json.error || 'Saving failed') + '</div>';
      }
    });

    $('resetSettingsBtn').addEventListener('click', async () => {
      const res = await fetch('/api/settings', { method: 'DELETE' });
      const json = await res.json();
      if (json.success) fillSettings(json.settings);
      $('settingsStatus').innerHTML = '<div class="alert alert-info mt-2">' + (json.message || json.error) + '</div>';
    });

    function applyTheme(theme) {
      document.documentElement.setAttribute('data-bs-theme', theme);
    }

    function shownTheme() {
      return document.documentElement.getAttribute('data-bs-theme');
    }

    async function loadTheme() {
      const res = await fetch('/api/settings/theme');
      const json = await res.json();
      if (json.theme) {
        applyTheme(json.theme);
      } else {
        const dark = window.matchMedia && window.matchMedia('(prefers-color-scheme: dark)').matches;
        applyTheme(dark ? 'dark' : 'light');
      }
    }

    $('themeBtn').addEventListener('click', async () => {
      const json = await post('/api/settings/theme/toggle', { current: shownTheme() });
      applyTheme(json.theme);
    });

    loadTheme();
    loadSettings();
  </script>
</body>
</html>"##;
