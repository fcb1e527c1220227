//! Course outline model and dependency-graph construction.
//!
//! Building the task graph from an outline is a pure function. Ids are
//! deterministic (`"{type}-{scope}-{index}"`), so constructing the graph
//! twice for the same outline yields byte-identical ids and a retried
//! submission cannot duplicate work.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::core::job::{JobId, Task, TaskId, TaskStatus, TaskType};

/// A lesson inside a module. One `Section` task is emitted per lesson, plus
/// one `Media` task per requested variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonOutline {
    /// Stable lesson identifier from the authoring surface.
    pub lesson_id: String,
    /// Display title, forwarded to the generator.
    pub title: String,
    /// Requested auxiliary media variants (e.g. "slides", "audio").
    #[serde(default)]
    pub media_variants: Vec<String>,
}

/// A module grouping lessons. One `ModuleQuiz` task is emitted per module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleOutline {
    /// Stable module identifier.
    pub module_id: String,
    /// Display title.
    pub title: String,
    /// Lessons in authoring order.
    pub lessons: Vec<LessonOutline>,
}

/// A learning path grouping modules. One `PathQuiz` task is emitted per path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathOutline {
    /// Stable path identifier.
    pub path_id: String,
    /// Display title.
    pub title: String,
    /// Ids of the modules this path spans.
    pub module_ids: Vec<String>,
}

/// The content outline a job is created from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseOutline {
    /// Stable course identifier.
    pub course_id: String,
    /// Display title.
    pub title: String,
    /// Modules in authoring order.
    pub modules: Vec<ModuleOutline>,
    /// Optional learning-path groupings over modules.
    #[serde(default)]
    pub paths: Vec<PathOutline>,
    /// Whether to emit the final class exam task.
    #[serde(default = "default_true")]
    pub include_exam: bool,
}

const fn default_true() -> bool {
    true
}

fn task_id(task_type: TaskType, scope: &str, index: usize) -> TaskId {
    TaskId(format!("{}-{scope}-{index}", task_type.as_str()))
}

/// Build the full task graph for an outline.
///
/// Emitted stages, leaves first: per-lesson section content, per-lesson
/// assessments (each depending on its section), per-module quizzes (depending
/// on the module's assessments), per-path quizzes (depending on the path's
/// module quizzes), one final exam (depending on every quiz), and per-lesson
/// media variants (depending on their section, lowest priority).
///
/// Pure and deterministic: the same outline always produces the same ids in
/// the same order.
#[must_use]
pub fn build_tasks(job_id: &JobId, outline: &CourseOutline, max_retry_count: u32) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut quiz_ids: Vec<TaskId> = Vec::new();
    let mut quiz_id_by_module: HashMap<&str, TaskId> = HashMap::new();
    // Media last so downstream aggregates never wait behind it.
    let mut media: Vec<Task> = Vec::new();

    for (module_index, module) in outline.modules.iter().enumerate() {
        let mut assessment_ids = Vec::with_capacity(module.lessons.len());

        for (lesson_index, lesson) in module.lessons.iter().enumerate() {
            let section_id = task_id(TaskType::Section, &lesson.lesson_id, lesson_index);
            tasks.push(Task::new(
                section_id.clone(),
                job_id.clone(),
                TaskType::Section,
                Vec::new(),
                json!({
                    "course_id": outline.course_id,
                    "module_id": module.module_id,
                    "lesson_id": lesson.lesson_id,
                    "title": lesson.title,
                }),
                max_retry_count,
            ));

            let assessment_id = task_id(TaskType::Assessment, &lesson.lesson_id, lesson_index);
            tasks.push(Task::new(
                assessment_id.clone(),
                job_id.clone(),
                TaskType::Assessment,
                vec![section_id.clone()],
                json!({
                    "course_id": outline.course_id,
                    "module_id": module.module_id,
                    "lesson_id": lesson.lesson_id,
                    "title": lesson.title,
                }),
                max_retry_count,
            ));
            assessment_ids.push(assessment_id);

            for (variant_index, variant) in lesson.media_variants.iter().enumerate() {
                media.push(Task::new(
                    task_id(TaskType::Media, &lesson.lesson_id, variant_index),
                    job_id.clone(),
                    TaskType::Media,
                    vec![section_id.clone()],
                    json!({
                        "course_id": outline.course_id,
                        "lesson_id": lesson.lesson_id,
                        "variant": variant,
                    }),
                    max_retry_count,
                ));
            }
        }

        let quiz_id = task_id(TaskType::ModuleQuiz, &module.module_id, module_index);
        tasks.push(Task::new(
            quiz_id.clone(),
            job_id.clone(),
            TaskType::ModuleQuiz,
            assessment_ids,
            json!({
                "course_id": outline.course_id,
                "module_id": module.module_id,
                "title": module.title,
            }),
            max_retry_count,
        ));
        quiz_id_by_module.insert(module.module_id.as_str(), quiz_id.clone());
        quiz_ids.push(quiz_id);
    }

    for (path_index, path) in outline.paths.iter().enumerate() {
        // Unknown module ids are silently skipped; an empty dependency list
        // just makes the path quiz immediately ready.
        let deps: Vec<TaskId> = path
            .module_ids
            .iter()
            .filter_map(|m| quiz_id_by_module.get(m.as_str()).cloned())
            .collect();
        let path_quiz_id = task_id(TaskType::PathQuiz, &path.path_id, path_index);
        tasks.push(Task::new(
            path_quiz_id.clone(),
            job_id.clone(),
            TaskType::PathQuiz,
            deps,
            json!({
                "course_id": outline.course_id,
                "path_id": path.path_id,
                "title": path.title,
            }),
            max_retry_count,
        ));
        quiz_ids.push(path_quiz_id);
    }

    if outline.include_exam {
        tasks.push(Task::new(
            task_id(TaskType::Exam, &outline.course_id, 0),
            job_id.clone(),
            TaskType::Exam,
            quiz_ids,
            json!({
                "course_id": outline.course_id,
                "title": outline.title,
            }),
            max_retry_count,
        ));
    }

    tasks.extend(media);
    tasks
}

/// Whether every dependency of `task` has reached a status that unblocks
/// dependents (`completed`, `skipped`, or `failed`).
///
/// A dependency id that does not appear in `statuses` blocks the task: a
/// dangling edge is a construction bug and the resilience monitor will
/// surface the job as stalled rather than run the task early.
#[must_use]
pub fn dependencies_satisfied(task: &Task, statuses: &HashMap<TaskId, TaskStatus>) -> bool {
    task.dependencies
        .iter()
        .all(|dep| statuses.get(dep).is_some_and(|s| s.satisfies_dependents()))
}
