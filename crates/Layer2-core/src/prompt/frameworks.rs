//! Static per-framework prompt configuration

use crate::error::GenerationError;
use crate::types::Framework;

/// Review checklist for one framework
#[derive(Debug)]
pub struct ValidationChecks {
    pub technical: &'static [&'static str],
    pub best_practices: &'static [&'static str],
    pub performance: &'static [&'static str],
    pub security: &'static [&'static str],
}

/// Optimisation hints surfaced in the validation prompt
#[derive(Debug)]
pub struct OptimizationHints {
    pub performance: &'static [&'static str],
    pub best_practices: &'static [&'static str],
}

/// Everything the prompt templates need to know about a framework
#[derive(Debug)]
pub struct FrameworkProfile {
    pub framework: Framework,
    pub display_name: &'static str,
    /// Opening line of the generation prompt
    pub generator_role: &'static str,
    /// Opening line of the validation prompt
    pub reviewer_role: &'static str,
    pub instructions: &'static [&'static str],
    pub required_files: &'static [&'static str],
    pub best_practices: &'static [&'static str],
    pub patterns: &'static [&'static str],
    pub checks: ValidationChecks,
    pub hints: OptimizationHints,
}

impl FrameworkProfile {
    /// Profile for a known framework
    pub fn of(framework: Framework) -> &'static FrameworkProfile {
        match framework {
            Framework::React => &REACT,
            Framework::Vue => &VUE,
            Framework::Svelte => &SVELTE,
            Framework::Angular => &ANGULAR,
            Framework::Nodejs => &NODEJS,
        }
    }

    /// Profile by framework id, e.g. `"react"`
    pub fn lookup(id: &str) -> Result<&'static FrameworkProfile, GenerationError> {
        id.parse::<Framework>().map(Self::of)
    }
}

// ============================================================================
// React
// ============================================================================

static REACT: FrameworkProfile = FrameworkProfile {
    framework: Framework::React,
    display_name: "React",
    generator_role: "You are an expert React developer. Create a modern React application with TypeScript.",
    reviewer_role: "You are an expert React code reviewer. Analyze the provided React code for:",
    instructions: &[
        "Use React 18+ with functional components and hooks",
        "Implement TypeScript interfaces for all data structures",
        "Include proper error boundaries and loading states",
        "Use CSS modules or styled-components for styling",
        "Include proper accessibility attributes",
        "Implement responsive design principles",
    ],
    required_files: &[
        "package.json with all necessary dependencies",
        "src/App.tsx as main component",
        "src/index.tsx as entry point",
        "src/components/ for reusable components",
        "src/hooks/ for custom hooks (if needed)",
        "src/types/ for TypeScript interfaces",
        "src/styles/ for styling files",
    ],
    best_practices: &[
        "Use descriptive variable and function names",
        "Add JSDoc comments for complex functions",
        "Implement proper error handling",
        "Use React.memo for performance optimization where appropriate",
        "Follow the single responsibility principle",
    ],
    patterns: &[
        "useState and useEffect for local state and side effects",
        "Custom hooks for reusable logic",
        "Composition over inheritance for shared UI",
    ],
    checks: ValidationChecks {
        technical: &[
            "Syntax errors and TypeScript type issues",
            "React-specific anti-patterns (e.g., direct state mutation)",
            "Missing dependencies in useEffect hooks",
            "Improper use of hooks (rules of hooks)",
            "Memory leaks and performance issues",
        ],
        best_practices: &[
            "Component composition and reusability",
            "Proper prop typing and validation",
            "State management patterns",
            "Error boundary implementation",
            "Accessibility compliance (ARIA attributes)",
        ],
        performance: &[
            "Unnecessary re-renders",
            "Missing React.memo or useMemo optimizations",
            "Large bundle size issues",
            "Inefficient data fetching patterns",
        ],
        security: &[
            "XSS vulnerabilities",
            "Unsafe HTML rendering",
            "Improper input validation",
        ],
    },
    hints: OptimizationHints {
        performance: &[
            "Use React.memo for expensive components",
            "Implement useMemo for expensive calculations",
            "Use useCallback for event handlers",
            "Consider code splitting with React.lazy",
            "Optimize bundle size with tree shaking",
        ],
        best_practices: &[
            "Use TypeScript for better type safety",
            "Implement error boundaries",
            "Use custom hooks for reusable logic",
            "Follow the single responsibility principle",
            "Add proper accessibility attributes",
        ],
    },
};

// ============================================================================
// Vue
// ============================================================================

static VUE: FrameworkProfile = FrameworkProfile {
    framework: Framework::Vue,
    display_name: "Vue.js",
    generator_role: "You are an expert Vue.js developer. Create a modern Vue 3 application with TypeScript.",
    reviewer_role: "You are an expert Vue.js code reviewer. Analyze the provided Vue code for:",
    instructions: &[
        "Use Vue 3 with Composition API and <script setup>",
        "Implement TypeScript interfaces and proper typing",
        "Include proper component lifecycle management",
        "Use CSS modules or scoped styles",
        "Include proper accessibility attributes",
        "Implement responsive design principles",
    ],
    required_files: &[
        "package.json with Vue 3 and TypeScript dependencies",
        "src/App.vue as main component",
        "src/main.ts as entry point",
        "src/components/ for reusable components",
        "src/composables/ for composition functions",
        "src/types/ for TypeScript interfaces",
        "src/styles/ for styling files",
    ],
    best_practices: &[
        "Use descriptive variable and function names",
        "Add JSDoc comments for complex functions",
        "Implement proper error handling",
        "Use defineProps and defineEmits with TypeScript",
        "Follow the single responsibility principle",
    ],
    patterns: &[
        "Reactive refs and computed properties for state",
        "Composables for shared logic",
        "Props down, events up between components",
    ],
    checks: ValidationChecks {
        technical: &[
            "Syntax errors and TypeScript type issues",
            "Vue-specific anti-patterns",
            "Improper reactivity usage",
            "Component lifecycle issues",
            "Template syntax errors",
        ],
        best_practices: &[
            "Component composition and reusability",
            "Proper prop and emit definitions",
            "State management with stores",
            "Proper use of Composition API",
            "Accessibility compliance",
        ],
        performance: &[
            "Unnecessary reactivity triggers",
            "Missing computed properties",
            "Inefficient watchers",
            "Large bundle size issues",
        ],
        security: &[
            "XSS vulnerabilities",
            "Unsafe template rendering",
            "Improper input validation",
        ],
    },
    hints: OptimizationHints {
        performance: &[
            "Use computed properties for derived state",
            "Implement v-memo for expensive lists",
            "Use defineAsyncComponent for code splitting",
            "Optimize bundle size with tree shaking",
            "Use shallow refs for large objects",
        ],
        best_practices: &[
            "Use TypeScript with Vue 3",
            "Implement proper error handling",
            "Use composables for reusable logic",
            "Follow Vue style guide",
            "Add proper accessibility attributes",
        ],
    },
};

// ============================================================================
// Svelte
// ============================================================================

static SVELTE: FrameworkProfile = FrameworkProfile {
    framework: Framework::Svelte,
    display_name: "SvelteKit",
    generator_role: "You are an expert Svelte developer. Create a modern SvelteKit application with TypeScript.",
    reviewer_role: "You are an expert Svelte code reviewer. Analyze the provided Svelte code for:",
    instructions: &[
        "Use SvelteKit with TypeScript support",
        "Use Svelte's built-in transitions and animations",
        "Include proper component lifecycle management",
        "Use scoped styles",
        "Include proper accessibility attributes",
        "Implement responsive design principles",
    ],
    required_files: &[
        "package.json with SvelteKit and TypeScript dependencies",
        "src/app.html as HTML template",
        "src/routes/+page.svelte as main page",
        "src/lib/ for reusable components and utilities",
        "src/stores/ for Svelte stores",
        "src/types/ for TypeScript interfaces",
    ],
    best_practices: &[
        "Use descriptive variable and function names",
        "Add JSDoc comments for complex functions",
        "Implement proper error handling",
        "Use Svelte stores for state management",
        "Follow the single responsibility principle",
    ],
    patterns: &[
        "Reactive statements for derived values",
        "Writable and derived stores for shared state",
        "Keyed each blocks for lists",
    ],
    checks: ValidationChecks {
        technical: &[
            "Syntax errors and TypeScript type issues",
            "Svelte-specific anti-patterns",
            "Improper reactive statements",
            "Component lifecycle issues",
            "Store management issues",
        ],
        best_practices: &[
            "Component composition and reusability",
            "Proper prop definitions",
            "State management with stores",
            "Proper use of reactive statements",
            "Accessibility compliance",
        ],
        performance: &[
            "Unnecessary reactive updates",
            "Missing derived stores",
            "Inefficient transitions",
            "Large bundle size issues",
        ],
        security: &[
            "XSS vulnerabilities",
            "Unsafe HTML rendering",
            "Improper input validation",
        ],
    },
    hints: OptimizationHints {
        performance: &[
            "Use derived stores for computed values",
            "Implement proper reactive statements",
            "Use dynamic imports for code splitting",
            "Optimize bundle size with rollup",
            "Use keyed each blocks for lists",
        ],
        best_practices: &[
            "Use TypeScript with SvelteKit",
            "Implement proper error handling",
            "Use stores for global state",
            "Follow Svelte conventions",
            "Add proper accessibility attributes",
        ],
    },
};

// ============================================================================
// Angular
// ============================================================================

static ANGULAR: FrameworkProfile = FrameworkProfile {
    framework: Framework::Angular,
    display_name: "Angular",
    generator_role: "You are an expert Angular developer. Create a modern Angular application with TypeScript.",
    reviewer_role: "You are an expert Angular code reviewer. Analyze the provided Angular code for:",
    instructions: &[
        "Use Angular 17+ with standalone components",
        "Implement TypeScript interfaces and services",
        "Follow Angular style guide and naming conventions",
        "Use Angular Material or custom CSS",
        "Include proper accessibility attributes",
        "Implement responsive design principles",
    ],
    required_files: &[
        "package.json with Angular dependencies",
        "src/main.ts as bootstrap file",
        "src/app/app.component.ts as main component",
        "src/app/components/ for feature components",
        "src/app/services/ for business logic",
        "src/app/models/ for TypeScript interfaces",
        "src/app/shared/ for shared utilities",
    ],
    best_practices: &[
        "Use descriptive variable and function names",
        "Add JSDoc comments for complex functions",
        "Implement proper error handling",
        "Use Angular services for data management",
        "Follow the single responsibility principle",
    ],
    patterns: &[
        "Signals for component state",
        "Reactive forms for user input",
        "Constructor or inject() based dependency injection",
    ],
    checks: ValidationChecks {
        technical: &[
            "Syntax errors and TypeScript type issues",
            "Angular-specific anti-patterns",
            "Improper dependency injection",
            "Component lifecycle issues",
            "RxJS usage problems",
        ],
        best_practices: &[
            "Component architecture and modularity",
            "Proper service implementation",
            "State management patterns",
            "Proper use of Angular features",
            "Accessibility compliance",
        ],
        performance: &[
            "Change detection issues",
            "Memory leaks in subscriptions",
            "Inefficient data binding",
            "Large bundle size issues",
        ],
        security: &[
            "XSS vulnerabilities",
            "Improper sanitization",
            "Authentication/authorization issues",
        ],
    },
    hints: OptimizationHints {
        performance: &[
            "Use OnPush change detection strategy",
            "Implement trackBy functions for lists",
            "Use lazy loading for modules",
            "Optimize bundle size with tree shaking",
            "Use async pipes for observables",
        ],
        best_practices: &[
            "Use TypeScript strictly",
            "Implement proper error handling",
            "Use services for business logic",
            "Follow Angular style guide",
            "Add proper accessibility attributes",
        ],
    },
};

// ============================================================================
// Node.js
// ============================================================================

static NODEJS: FrameworkProfile = FrameworkProfile {
    framework: Framework::Nodejs,
    display_name: "Node.js",
    generator_role: "You are an expert Node.js developer. Create a modern Node.js application with TypeScript.",
    reviewer_role: "You are an expert Node.js code reviewer. Analyze the provided Node.js code for:",
    instructions: &[
        "Use Node.js with TypeScript and modern ES modules",
        "Implement Express.js with proper middleware",
        "Include proper error handling and logging",
        "Implement proper security measures",
        "Include environment configuration",
        "Use proper database integration (if needed)",
    ],
    required_files: &[
        "package.json with Node.js and TypeScript dependencies",
        "src/index.ts as entry point",
        "src/routes/ for API routes",
        "src/middleware/ for Express middleware",
        "src/services/ for business logic",
        "src/models/ for data models",
        "src/utils/ for utility functions",
        "src/config/ for configuration",
    ],
    best_practices: &[
        "Use descriptive variable and function names",
        "Add JSDoc comments for complex functions",
        "Implement proper error handling",
        "Use environment variables for configuration",
        "Follow the single responsibility principle",
    ],
    patterns: &[
        "async/await for asynchronous operations",
        "Router modules per resource",
        "Centralised error-handling middleware",
    ],
    checks: ValidationChecks {
        technical: &[
            "Syntax errors and TypeScript type issues",
            "Async/await usage problems",
            "Error handling issues",
            "Memory leaks",
            "Database connection problems",
        ],
        best_practices: &[
            "API design and RESTful principles",
            "Middleware implementation",
            "Environment configuration",
            "Logging and monitoring",
            "Code organization",
        ],
        performance: &[
            "Blocking operations",
            "Inefficient database queries",
            "Memory usage issues",
            "CPU-intensive operations",
        ],
        security: &[
            "Authentication and authorization",
            "Input validation and sanitization",
            "SQL injection vulnerabilities",
            "Rate limiting and DDoS protection",
            "Sensitive data exposure",
        ],
    },
    hints: OptimizationHints {
        performance: &[
            "Use connection pooling for databases",
            "Implement caching strategies",
            "Use clustering for CPU-intensive tasks",
            "Optimize database queries",
            "Use compression middleware",
        ],
        best_practices: &[
            "Use TypeScript for better type safety",
            "Implement proper error handling",
            "Use environment variables",
            "Follow REST API conventions",
            "Add proper security measures",
        ],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_framework_has_a_profile() {
        for framework in Framework::ALL {
            let profile = FrameworkProfile::of(framework);
            assert_eq!(profile.framework, framework);
            assert!(!profile.required_files.is_empty());
            assert!(profile.hints.performance.len() >= 3);
            assert!(profile.hints.best_practices.len() >= 3);
        }
    }

    #[test]
    fn test_lookup_unknown_framework() {
        assert!(matches!(
            FrameworkProfile::lookup("ember"),
            Err(GenerationError::UnsupportedFramework(_))
        ));
        assert_eq!(
            FrameworkProfile::lookup("svelte").unwrap().display_name,
            "SvelteKit"
        );
    }
}
