//! Service worker generation.
//!
//! The generated worker is plain JavaScript with no runtime dependencies.
//! Routing rules are emitted as a JSON table; glob patterns are compiled to
//! regular expressions inside the worker.

use pwaify_types::manifest::CachingStrategy;
use pwaify_types::scan::Framework;
use serde::Serialize;
use sha2::{Digest, Sha256};

const DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Handler {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    NetworkOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeRule {
    pub url_pattern: String,
    pub handler: Handler,
    pub cache_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_timeout_seconds: Option<u32>,
}

impl RuntimeRule {
    fn new(pattern: &str, handler: Handler, cache: &str) -> Self {
        Self {
            url_pattern: pattern.to_string(),
            handler,
            cache_name: cache.to_string(),
            max_entries: None,
            max_age_seconds: None,
            network_timeout_seconds: None,
        }
    }

    fn expire(mut self, max_entries: u32, max_age_seconds: u64) -> Self {
        self.max_entries = Some(max_entries);
        self.max_age_seconds = Some(max_age_seconds);
        self
    }

    fn timeout(mut self, seconds: u32) -> Self {
        self.network_timeout_seconds = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerOptions {
    /// Prefix for cache names.
    pub cache_prefix: String,
    pub strategy: CachingStrategy,
    /// URLs cached on install.
    pub precache: Vec<String>,
    pub runtime_caching: Vec<RuntimeRule>,
    pub skip_waiting: bool,
    pub clients_claim: bool,
    pub navigation_preload: bool,
}

impl ServiceWorkerOptions {
    /// Rules tuned for `framework` under `strategy`.
    pub fn for_framework(framework: Framework, strategy: CachingStrategy) -> Self {
        let prefix = match framework {
            Framework::Unknown => "pwaify".to_string(),
            f => f.as_str().to_string(),
        };
        Self {
            runtime_caching: runtime_rules(framework, strategy, &prefix),
            cache_prefix: prefix,
            strategy,
            precache: Vec::new(),
            skip_waiting: true,
            clients_claim: true,
            navigation_preload: false,
        }
    }
}

fn static_patterns(framework: Framework) -> &'static [&'static str] {
    match framework {
        Framework::Django => &["/static/**", "/media/**"],
        Framework::Flask | Framework::FastApi => &["/static/**"],
        Framework::Laravel | Framework::Symfony => &["/build/**", "/assets/**"],
        Framework::Next => &["/_next/static/**"],
        Framework::Nuxt => &["/_nuxt/**"],
        _ => &["/assets/**", "/static/**"],
    }
}

/// Routes that must always hit the network on server-rendered backends.
const SECURE_ROUTES: &[&str] = &["/admin/**", "/api/auth/**", "/dashboard/**"];

const ASSET_EXTENSIONS: &str = "**/*.{js,css,png,jpg,jpeg,svg,webp,woff,woff2}";

pub fn runtime_rules(
    framework: Framework,
    strategy: CachingStrategy,
    prefix: &str,
) -> Vec<RuntimeRule> {
    let mut rules = Vec::new();
    if framework.is_backend() {
        for route in SECURE_ROUTES {
            rules.push(RuntimeRule::new(
                route,
                Handler::NetworkOnly,
                &format!("{prefix}-secure"),
            ));
        }
    }

    let static_cache = format!("{prefix}-static-cache");
    let (static_handler, static_age) = match strategy {
        CachingStrategy::Aggressive => (Handler::CacheFirst, 60 * DAY),
        CachingStrategy::Balanced => (Handler::CacheFirst, 30 * DAY),
        CachingStrategy::Conservative => (Handler::StaleWhileRevalidate, 7 * DAY),
    };
    for pattern in static_patterns(framework)
        .iter()
        .copied()
        .chain([ASSET_EXTENSIONS])
    {
        rules.push(RuntimeRule::new(pattern, static_handler, &static_cache).expire(100, static_age));
    }

    let api_cache = format!("{prefix}-api-cache");
    rules.push(match strategy {
        CachingStrategy::Conservative => RuntimeRule::new("/api/**", Handler::NetworkOnly, &api_cache),
        CachingStrategy::Balanced => RuntimeRule::new("/api/**", Handler::NetworkFirst, &api_cache)
            .timeout(3)
            .expire(50, 300),
        CachingStrategy::Aggressive => {
            RuntimeRule::new("/api/**", Handler::StaleWhileRevalidate, &api_cache)
                .expire(100, 3600)
        }
    });

    let page_handler = match strategy {
        CachingStrategy::Aggressive => Handler::StaleWhileRevalidate,
        _ => Handler::NetworkFirst,
    };
    let mut pages = RuntimeRule::new("/**", page_handler, &format!("{prefix}-pages"))
        .expire(50, DAY);
    if page_handler == Handler::NetworkFirst {
        pages = pages.timeout(3);
    }
    rules.push(pages);
    rules
}

/// Cache version derived from the options, so any rule change invalidates old caches.
pub fn cache_version(opts: &ServiceWorkerOptions) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(opts)?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(&digest[..4]))
}

pub fn render_service_worker(opts: &ServiceWorkerOptions) -> Result<String, serde_json::Error> {
    let version = cache_version(opts)?;
    let precache = serde_json::to_string(&opts.precache)?;
    let rules = serde_json::to_string_pretty(&opts.runtime_caching)?;
    Ok(SW_TEMPLATE
        .replace("__PREFIX__", &js_string(&opts.cache_prefix))
        .replace("__VERSION__", &version)
        .replace("__STRATEGY__", opts.strategy.as_str())
        .replace("__PRECACHE__", &precache)
        .replace("__RULES__", &rules)
        .replace("__SKIP_WAITING__", bool_js(opts.skip_waiting))
        .replace("__CLIENTS_CLAIM__", bool_js(opts.clients_claim))
        .replace("__NAV_PRELOAD__", bool_js(opts.navigation_preload)))
}

fn bool_js(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

fn js_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

const SW_TEMPLATE: &str = r#"// Generated by pwaify. Strategy: __STRATEGY__.
const CACHE_PREFIX = '__PREFIX__';
const CACHE_VERSION = '__VERSION__';
const PRECACHE_NAME = `${CACHE_PREFIX}-precache-${CACHE_VERSION}`;
const PRECACHE_URLS = __PRECACHE__;
const RULES = __RULES__;

function globToRegExp(glob) {
  let re = '';
  for (let i = 0; i < glob.length; i++) {
    const c = glob[i];
    if (c === '*' && glob[i + 1] === '*') { re += '.*'; i++; }
    else if (c === '*') { re += '[^/]*'; }
    else if (c === '{') { re += '('; }
    else if (c === '}') { re += ')'; }
    else if (c === ',') { re += '|'; }
    else if ('\\^$.|?+()[]'.includes(c)) { re += '\\' + c; }
    else { re += c; }
  }
  return new RegExp('^' + re + '$');
}

const COMPILED = RULES.map((rule) => ({ ...rule, re: globToRegExp(rule.urlPattern) }));

function cacheNameFor(rule) {
  return `${rule.cacheName}-${CACHE_VERSION}`;
}

async function trim(cacheName, maxEntries) {
  if (!maxEntries) return;
  const cache = await caches.open(cacheName);
  const keys = await cache.keys();
  for (let i = 0; i < keys.length - maxEntries; i++) {
    await cache.delete(keys[i]);
  }
}

function fresh(response, maxAgeSeconds) {
  if (!maxAgeSeconds || !response) return !!response;
  const date = response.headers.get('date');
  if (!date) return true;
  return Date.now() - new Date(date).getTime() < maxAgeSeconds * 1000;
}

async function put(rule, request, response) {
  if (!response || !response.ok) return response;
  const cache = await caches.open(cacheNameFor(rule));
  await cache.put(request, response.clone());
  await trim(cacheNameFor(rule), rule.maxEntries);
  return response;
}

function withTimeout(promise, seconds) {
  if (!seconds) return promise;
  return Promise.race([
    promise,
    new Promise((_, reject) => setTimeout(() => reject(new Error('timeout')), seconds * 1000)),
  ]);
}

const HANDLERS = {
  async CacheFirst(rule, request) {
    const cached = await caches.match(request);
    if (fresh(cached, rule.maxAgeSeconds)) return cached;
    return put(rule, request, await fetch(request));
  },
  async NetworkFirst(rule, request) {
    try {
      return await put(rule, request, await withTimeout(fetch(request), rule.networkTimeoutSeconds));
    } catch (err) {
      const cached = await caches.match(request);
      if (cached) return cached;
      throw err;
    }
  },
  async StaleWhileRevalidate(rule, request) {
    const cached = await caches.match(request);
    const network = fetch(request).then((response) => put(rule, request, response));
    return cached || network;
  },
  async NetworkOnly(_rule, request) {
    return fetch(request);
  },
};

self.addEventListener('install', (event) => {
  event.waitUntil(
    caches.open(PRECACHE_NAME)
      .then((cache) => cache.addAll(PRECACHE_URLS))
      .then(() => (__SKIP_WAITING__ ? self.skipWaiting() : undefined)),
  );
});

self.addEventListener('activate', (event) => {
  event.waitUntil((async () => {
    const keys = await caches.keys();
    await Promise.all(
      keys
        .filter((key) => key.startsWith(CACHE_PREFIX) && !key.endsWith(CACHE_VERSION))
        .map((key) => caches.delete(key)),
    );
    if (__NAV_PRELOAD__ && self.registration.navigationPreload) {
      await self.registration.navigationPreload.enable();
    }
    if (__CLIENTS_CLAIM__) await self.clients.claim();
  })());
});

self.addEventListener('fetch', (event) => {
  const { request } = event;
  if (request.method !== 'GET') return;
  const url = new URL(request.url);
  if (url.origin !== self.location.origin) return;
  const rule = COMPILED.find((r) => r.re.test(url.pathname));
  if (!rule) return;
  event.respondWith(HANDLERS[rule.handler](rule, request));
});
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flask_balanced_matches_backend_conventions() {
        let opts = ServiceWorkerOptions::for_framework(Framework::Flask, CachingStrategy::Balanced);
        let stat = opts
            .runtime_caching
            .iter()
            .find(|r| r.url_pattern == "/static/**")
            .unwrap();
        assert_eq!(stat.handler, Handler::CacheFirst);
        assert_eq!(stat.cache_name, "flask-static-cache");
        assert_eq!(stat.max_age_seconds, Some(30 * DAY));

        let api = opts
            .runtime_caching
            .iter()
            .find(|r| r.url_pattern == "/api/**")
            .unwrap();
        assert_eq!(api.handler, Handler::NetworkFirst);
        assert_eq!(api.network_timeout_seconds, Some(3));
    }

    #[test]
    fn secure_routes_come_first_for_backends() {
        let opts = ServiceWorkerOptions::for_framework(Framework::Django, CachingStrategy::Aggressive);
        assert_eq!(opts.runtime_caching[0].url_pattern, "/admin/**");
        assert_eq!(opts.runtime_caching[0].handler, Handler::NetworkOnly);

        let spa = ServiceWorkerOptions::for_framework(Framework::React, CachingStrategy::Aggressive);
        assert!(spa.runtime_caching.iter().all(|r| r.url_pattern != "/admin/**"));
    }

    #[test]
    fn conservative_never_caches_api() {
        let opts =
            ServiceWorkerOptions::for_framework(Framework::Static, CachingStrategy::Conservative);
        let api = opts
            .runtime_caching
            .iter()
            .find(|r| r.url_pattern == "/api/**")
            .unwrap();
        assert_eq!(api.handler, Handler::NetworkOnly);
    }

    #[test]
    fn version_tracks_options() {
        let a = ServiceWorkerOptions::for_framework(Framework::Static, CachingStrategy::Balanced);
        let b = ServiceWorkerOptions::for_framework(Framework::Static, CachingStrategy::Aggressive);
        assert_eq!(cache_version(&a).unwrap(), cache_version(&a).unwrap());
        assert_ne!(cache_version(&a).unwrap(), cache_version(&b).unwrap());
        assert_eq!(cache_version(&a).unwrap().len(), 8);
    }

    #[test]
    fn rendered_worker_has_no_placeholders() {
        let opts = ServiceWorkerOptions::for_framework(Framework::Vue, CachingStrategy::Balanced);
        let js = render_service_worker(&opts).unwrap();
        assert!(!js.contains("__"), "unreplaced placeholder in:\n{js}");
        assert!(js.contains("const CACHE_PREFIX = 'vue';"));
        assert!(js.contains("\"urlPattern\": \"/api/**\""));
        assert!(js.contains("\"handler\": \"NetworkFirst\""));
    }
}
