//! Starter project templates
//!
//! Scaffolds are a seed for the editor, not part of the generation
//! pipeline. The lookup sits behind [`TemplateProvider`] so a registry-backed
//! source can replace the built-in one.

use crate::types::{FileMap, Framework};

/// Source of default scaffold files per framework
pub trait TemplateProvider: Send + Sync {
    fn scaffold(&self, framework: Framework) -> FileMap;
}

/// Minimal built-in starter projects
#[derive(Debug, Clone, Default)]
pub struct StaticTemplateProvider;

impl StaticTemplateProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateProvider for StaticTemplateProvider {
    fn scaffold(&self, framework: Framework) -> FileMap {
        let files: &[(&str, &str)] = match framework {
            Framework::React => REACT,
            Framework::Vue => VUE,
            Framework::Svelte => SVELTE,
            Framework::Angular => ANGULAR,
            Framework::Nodejs => NODEJS,
        };
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect()
    }
}

const REACT: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "react-app",
  "private": true,
  "type": "module",
  "scripts": { "dev": "vite", "build": "vite build" },
  "dependencies": { "react": "^18.3.1", "react-dom": "^18.3.1" },
  "devDependencies": { "@vitejs/plugin-react": "^4.3.1", "typescript": "^5.5.3", "vite": "^5.4.0" }
}
"#,
    ),
    (
        "index.html",
        r#"<!doctype html>
<html lang="en">
  <body>
    <div id="root"></div>
    <script type="module" src="/src/index.tsx"></script>
  </body>
</html>
"#,
    ),
    (
        "src/index.tsx",
        r#"import { createRoot } from 'react-dom/client';
import App from './App';

createRoot(document.getElementById('root')!).render(<App />);
"#,
    ),
    (
        "src/App.tsx",
        r#"export default function App() {
  return <h1>Hello, React</h1>;
}
"#,
    ),
];

const VUE: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "vue-app",
  "private": true,
  "type": "module",
  "scripts": { "dev": "vite", "build": "vite build" },
  "dependencies": { "vue": "^3.4.0" },
  "devDependencies": { "@vitejs/plugin-vue": "^5.1.0", "typescript": "^5.5.3", "vite": "^5.4.0" }
}
"#,
    ),
    (
        "index.html",
        r#"<!doctype html>
<html lang="en">
  <body>
    <div id="app"></div>
    <script type="module" src="/src/main.ts"></script>
  </body>
</html>
"#,
    ),
    (
        "src/main.ts",
        r#"import { createApp } from 'vue';
import App from './App.vue';

createApp(App).mount('#app');
"#,
    ),
    (
        "src/App.vue",
        r#"<script setup lang="ts">
const greeting = 'Hello, Vue';
</script>

<template>
  <h1>{{ greeting }}</h1>
</template>
"#,
    ),
];

const SVELTE: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "svelte-app",
  "private": true,
  "type": "module",
  "scripts": { "dev": "vite dev", "build": "vite build" },
  "devDependencies": { "@sveltejs/kit": "^2.5.0", "svelte": "^4.2.0", "typescript": "^5.5.3", "vite": "^5.4.0" }
}
"#,
    ),
    (
        "src/app.html",
        r#"<!doctype html>
<html lang="en">
  <head>%sveltekit.head%</head>
  <body>
    <div>%sveltekit.body%</div>
  </body>
</html>
"#,
    ),
    (
        "src/routes/+page.svelte",
        r#"<script lang="ts">
  let name = 'Svelte';
</script>

<h1>Hello, {name}</h1>
"#,
    ),
];

const ANGULAR: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "angular-app",
  "private": true,
  "scripts": { "start": "ng serve", "build": "ng build" },
  "dependencies": {
    "@angular/core": "^17.3.0",
    "@angular/platform-browser": "^17.3.0",
    "rxjs": "^7.8.0",
    "zone.js": "^0.14.0"
  },
  "devDependencies": { "@angular/cli": "^17.3.0", "typescript": "~5.4.0" }
}
"#,
    ),
    (
        "src/main.ts",
        r#"import { bootstrapApplication } from '@angular/platform-browser';
import { AppComponent } from './app/app.component';

bootstrapApplication(AppComponent).catch((err) => console.error(err));
"#,
    ),
    (
        "src/app/app.component.ts",
        r#"import { Component } from '@angular/core';

@Component({
  selector: 'app-root',
  standalone: true,
  template: '<h1>Hello, Angular</h1>',
})
export class AppComponent {}
"#,
    ),
];

const NODEJS: &[(&str, &str)] = &[
    (
        "package.json",
        r#"{
  "name": "node-app",
  "private": true,
  "type": "module",
  "scripts": { "dev": "tsx watch src/index.ts", "build": "tsc" },
  "dependencies": { "express": "^4.19.0" },
  "devDependencies": { "@types/express": "^4.17.21", "tsx": "^4.16.0", "typescript": "^5.5.3" }
}
"#,
    ),
    (
        "src/index.ts",
        r#"import express from 'express';

const app = express();
const port = Number(process.env.PORT ?? 3000);

app.get('/', (_req, res) => {
  res.json({ message: 'Hello, Node.js' });
});

app.listen(port, () => console.log(`Listening on ${port}`));
"#,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_framework_has_a_scaffold_with_package_json() {
        let provider = StaticTemplateProvider::new();
        for framework in Framework::ALL {
            let files = provider.scaffold(framework);
            assert!(files.contains_key("package.json"), "{}", framework);
            assert!(files.len() >= 2);
        }
    }

    #[test]
    fn test_react_scaffold_entry_points() {
        let files = StaticTemplateProvider::new().scaffold(Framework::React);
        assert!(files["src/index.tsx"].contains("createRoot"));
        assert!(files.contains_key("src/App.tsx"));
    }
}
