//! Built-in lessons that keep the app useful without an external lesson bank.

use std::collections::BTreeMap;

use crate::domain::{Lesson, LessonIntro, Module, SolutionSpec, Stage};

const CPP_HEADER: &str = "#include <iostream>\nusing namespace std;\n\nint main() {\n";
const CPP_FOOTER: &str = "  \n  return 0;\n}";

fn main_body(body: &str) -> String {
  format!("{CPP_HEADER}{body}{CPP_FOOTER}")
}

fn stage(step: u32, instruction: &str, body: &str, solutions: Vec<SolutionSpec>, hint: &str) -> Stage {
  Stage {
    step,
    instruction: instruction.into(),
    code_template: main_body(body),
    solutions,
    hint: hint.into(),
    preview_code: None,
  }
}

fn literals(texts: &[&str]) -> Vec<SolutionSpec> {
  SolutionSpec::from_authored_list(texts)
}

fn intro(story: &str, example_code: &str, efficiency_tip: &str) -> Option<LessonIntro> {
  Some(LessonIntro {
    story: story.into(),
    example_code: example_code.into(),
    efficiency_tip: Some(efficiency_tip.into()),
  })
}

/// Lessons in course order.
pub fn seed_lessons() -> Vec<Lesson> {
  vec![
    Lesson {
      id: "lesson-1".into(),
      title: "Output".into(),
      module: Module::Pg1,
      concept: "The Voice".into(),
      description: "Computers are silent until we give them a voice. In C++, we use `cout` to speak.".into(),
      intro: intro(
        "Your program is a mute robot until it speaks. `cout` (character output) hands it a microphone.",
        "cout << \"I can speak!\";",
        "Prefer `\\n` over `endl` in hot loops: `endl` also flushes the stream.",
      ),
      variants: BTreeMap::new(),
      preview_code: Some("cout << \"Hello World\";".into()),
      stages: vec![
        stage(
          1,
          "Make the computer say 'Hello World'.",
          "  // Output: Hello World\n",
          literals(&["cout << \"Hello World\";", "cout << \"Hello World\" << endl;", "cout << \"Hello World\\n\";"]),
          "Use `cout << \"Text\";`",
        ),
        stage(
          2,
          "Now print 'C++' on its own line. Use `\\n` for a new line.",
          "  cout << \"Hello\\n\";\n  // Print C++ below\n",
          literals(&["cout << \"C++\";", "cout << \"C++\\n\";", "cout << \"C++\" << endl;"]),
          "Just like the first line, but with different text.",
        ),
        stage(
          3,
          "Chain them together! Print 'Level' and 'Up' in one statement using `<<` twice.",
          "  // Print LevelUp\n",
          literals(&["cout << \"Level\" << \"Up\";", "cout << \"Level\" << \"Up\" << endl;", "cout << \"Level\" << \"Up\\n\";"]),
          "Pattern: `cout << part1 << part2;`",
        ),
      ],
    },
    Lesson {
      id: "lesson-2".into(),
      title: "Variables".into(),
      module: Module::Pg1,
      concept: "The Box".into(),
      description: "Variables are named storage containers. C++ is strongly typed: specific boxes for specific shapes.".into(),
      intro: intro(
        "You wouldn't put soup in a cardboard box. `int` holds whole numbers, `double` decimals and `string` text.",
        "int health = 100;\nstring hero = \"Geralt\";",
        "For everyday counters just use `int`; processors are optimized for it.",
      ),
      variants: BTreeMap::from([(
        "targetType".to_string(),
        vec!["int".to_string(), "double".to_string(), "string".to_string()],
      )]),
      preview_code: Some("int score = 10;\ndouble price = 4.99;\nstring name = \"Player\";".into()),
      stages: vec![
        stage(
          1,
          "Create a `{{targetType}}` variable with **any name you want** and set it to an initial value.",
          "  // Create {{targetType}} variable\n",
          vec![SolutionSpec::Regex(
            r#"{{targetType}}\s+(?<varName>\w+)\s*=\s*(?:[\d\.]+|"[^"]*")\s*;"#.into(),
          )],
          "Follow the pattern: `{{targetType}} name = value;` e.g. `{{targetType}} myVar = ...;`",
        ),
        stage(
          2,
          "Now update your `{{targetType}}` variable `{{varName}}` to be a new value.",
          "  {{targetType}} {{varName}} = ...;\n  // Update {{varName}}\n",
          vec![SolutionSpec::Regex(r#"\b{{varName}}\s*=\s*(?:[\d\.]+|"[^"]*")\s*;"#.into())],
          "Just use `{{varName}} = new_value;`.",
        ),
        stage(
          3,
          "Output your variable `{{varName}}` using `cout`.",
          "  // Print {{varName}}\n",
          vec![SolutionSpec::ContextLiteral("cout << {{varName}};".into())],
          "`cout << {{varName}};`",
        ),
      ],
    },
    Lesson {
      id: "lesson-input".into(),
      title: "Input".into(),
      module: Module::Pg1,
      concept: "The Ear".into(),
      description: "Programs need to listen. `cin` reads keyboard input into variables.".into(),
      intro: intro(
        "`cin` (character input) is the ear of your program. The arrows `>>` point where the data goes.",
        "int age;\ncin >> age;",
        "For huge inputs, `ios::sync_with_stdio(false)` makes `cin` much faster.",
      ),
      variants: BTreeMap::new(),
      preview_code: Some("int age;\ncin >> age;".into()),
      stages: vec![
        stage(
          1,
          "Read a number into the variable `score`.",
          "  int score;\n  // Read input into score\n",
          literals(&["cin >> score;"]),
          "Use `cin >> variableName;`",
        ),
        stage(
          2,
          "Multiple Inputs: Read `width` then `height`.",
          "  int width; int height;\n  // Read width then height\n",
          literals(&["cin >> width >> height;", "cin >> width; cin >> height;"]),
          "Chain them: `cin >> a >> b;`",
        ),
        stage(
          3,
          "Interactive: Print 'Enter age: ', then read `age`.",
          "  int age;\n  // Print prompt then read\n",
          literals(&["cout << \"Enter age: \"; cin >> age;", "cout << \"Enter age: \" << endl; cin >> age;"]),
          "First `cout`, then `cin`.",
        ),
      ],
    },
    Lesson {
      id: "lesson-3".into(),
      title: "Conditionals".into(),
      module: Module::Pg1,
      concept: "The Fork".into(),
      description: "Data comes down the wire and logic decides where it goes.".into(),
      intro: intro(
        "If I have money, I buy pizza. Else, I eat leftovers. Code decides the same way with `if`, `else`, `&&` and `||`.",
        "if (hasKey) {\n  openDoor();\n} else {\n  cout << \"Locked\";\n}",
        "In `if (A && B)`, B is never evaluated when A is false. Put the cheapest check first.",
      ),
      variants: BTreeMap::new(),
      preview_code: Some("if (score > 100) {\n  cout << \"Win\";\n} else {\n  cout << \"Try Again\";\n}".into()),
      stages: vec![
        stage(
          1,
          "If `health` is 0, print 'Game Over'.",
          "  int health = 0;\n  // Check health\n",
          vec![SolutionSpec::Regex(r#"if\s*\(\s*health\s*==\s*0\s*\)\s*\{?\s*cout\s*<<\s*"Game Over"\s*;?\s*\}?"#.into())],
          "Comparison uses `==`. `if (health == 0) { ... }`",
        ),
        stage(
          2,
          "Else logic: If `coins` is greater than 10, print 'Rich', otherwise print 'Poor'.",
          "  int coins = 5;\n  // Logical check\n",
          vec![SolutionSpec::Regex(
            r#"if\s*\(\s*coins\s*>\s*10\s*\)\s*\{?\s*cout\s*<<\s*"Rich"\s*;?\s*\}?\s*else\s*\{?\s*cout\s*<<\s*"Poor"\s*;?\s*\}?"#.into(),
          )],
          "`if (cond) { } else { }`",
        ),
        stage(
          3,
          "Compound Logic: Check if `level` > 5 AND `key` is true. Use `&&`. If so, print 'Enter'.",
          "  int level = 10; bool key = true;\n  // Check both\n",
          vec![SolutionSpec::Regex(
            r#"if\s*\(\s*((level\s*>\s*5\s*&&\s*key)|(key\s*&&\s*level\s*>\s*5))\s*\)\s*\{?\s*cout\s*<<\s*"Enter"\s*;?\s*\}?"#.into(),
          )],
          "`if (A && B) { ... }`",
        ),
      ],
    },
    Lesson {
      id: "lesson-4".into(),
      title: "Loops".into(),
      module: Module::Pg1,
      concept: "The Cycle".into(),
      description: "Algorithms often require visiting every item or repeating until done.".into(),
      intro: intro(
        "Don't repeat yourself. `for` loops are for when you know how many times, `while` loops for when you don't.",
        "for(int i=0; i<5; i++) {\n  cout << \"Repetition is key\";\n}",
        "For plain integers `i++` and `++i` compile to the same code.",
      ),
      variants: BTreeMap::new(),
      preview_code: Some("for (int i = 0; i < 5; i++) {\n  cout << i;\n}".into()),
      stages: vec![
        stage(
          1,
          "Write a standard `for` loop from 0 to 9 (10 times). Print the loop variable.",
          "  // Loop 0 to 9\n",
          vec![SolutionSpec::Regex(
            r"for\s*\(\s*int\s+(\w+)\s*=\s*0\s*;\s*\1\s*<\s*10\s*;\s*\1\+\+\s*\)\s*\{\s*cout\s*<<\s*\1\s*;\s*\}".into(),
          )],
          "`for (int i = 0; i < N; i++)`",
        ),
        stage(
          2,
          "Accumulator Pattern: Sum numbers 1 to 5 using a loop.",
          "  int sum = 0;\n  for (int i = 1; i <= 5; i++) {\n     // Add i to sum\n  }\n  cout << sum;\n",
          vec![SolutionSpec::Regex(r"sum\s*\+=\s*(\w+)\s*;|sum\s*=\s*sum\s*\+\s*(\w+)\s*;".into())],
          "Short for `sum = sum + i;`",
        ),
        stage(
          3,
          "While Loop: Run while `fuel > 0`. Inside, print the **variable** `fuel` (no quotes!), then decrease `fuel` by 1.",
          "  int fuel = 10;\n  while (fuel > 0) {\n     // 1. Print variable 'fuel'\n     // 2. Decrement 'fuel'\n  }\n",
          vec![SolutionSpec::Regex(
            r"cout\s*<<\s*fuel\s*;\s*(fuel\s*--|--\s*fuel|fuel\s*-=\s*1|fuel\s*=\s*fuel\s*-\s*1)\s*;".into(),
          )],
          "Make sure you don't use quotes around `fuel`! Quotes print the word, not the number.",
        ),
      ],
    },
    Lesson {
      id: "lesson-pointers".into(),
      title: "Pointers".into(),
      module: Module::Pg2,
      concept: "The Compass".into(),
      description: "Variables store data, pointers store where that data lives.".into(),
      intro: intro(
        "A pointer is not the house; it is the address of the house written on paper. Follow the address and you find the house.",
        "int money = 100;\nint* ptr = &money;\n*ptr = 200; // money is now 200",
        "Dereferencing is fast, but chasing long chains of pointers causes cache misses.",
      ),
      variants: BTreeMap::new(),
      preview_code: Some("int x = 10;\nint* ptr = &x;\n*ptr = 20;".into()),
      stages: vec![
        stage(
          1,
          "Address Of: Print the memory address of `score` using `&`.",
          "  int score = 10;\n  // Print address\n",
          literals(&["cout << &score;"]),
          "`&variable` gives the address.",
        ),
        stage(
          2,
          "Pointer: Create a pointer `p` that points to `score`.",
          "  int score = 10;\n  // int* p = ...\n",
          literals(&["int* p = &score;"]),
          "`Type* name = &variable;`",
        ),
        stage(
          3,
          "Dereference: Change the value of `score` to 50 using only `p`.",
          "  int score = 10;\n  int* p = &score;\n  // Change score via p\n",
          literals(&["*p = 50;"]),
          "`*p` accesses the value pointed to.",
        ),
      ],
    },
  ]
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::config::unresolvable_placeholders;
  use crate::course::CourseProgress;
  use crate::engine::matcher::match_solutions;
  use crate::engine::normalize::normalize;
  use crate::engine::Bindings;
  use crate::store::MemoryStore;

  fn passes(stage: &Stage, code: &str, context: &Bindings) -> bool {
    match_solutions(code, &normalize(code), &stage.solutions, context).success
  }

  #[test]
  fn seed_lessons_are_well_formed() {
    let lessons = seed_lessons();
    let mut ids: Vec<&str> = lessons.iter().map(|l| l.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), lessons.len());
    for lesson in &lessons {
      assert!(!lesson.stages.is_empty(), "{} has no stages", lesson.id);
      assert!(lesson.stages.iter().all(|s| !s.solutions.is_empty()));
      assert!(unresolvable_placeholders(lesson).is_empty(), "{} has dangling placeholders", lesson.id);
    }
  }

  // Each stage must be passable by its intended answer.
  #[test]
  fn intended_answers_pass() {
    let lessons = seed_lessons();
    let none = Bindings::new();

    let output = &lessons[0];
    assert!(passes(&output.stages[0], "int main() {\n  std::cout << \"Hello World\";\n}", &none));
    assert!(passes(&output.stages[2], "cout<<\"Level\"<<\"Up\";", &none));

    let vars = &lessons[1];
    let ctx: Bindings = [("targetType".to_string(), "string".to_string())].into();
    let outcome = match_solutions(
      "string hero = \"Ana\";",
      &normalize("string hero = \"Ana\";"),
      &vars.stages[0].solutions,
      &ctx,
    );
    assert!(outcome.success);
    assert_eq!(outcome.captures["varName"], "hero");
    let ctx: Bindings = [("targetType".to_string(), "int".to_string()), ("varName".to_string(), "hp".to_string())].into();
    assert!(passes(&vars.stages[1], "int hp = 3;\nhp = 20;", &ctx));
    assert!(!passes(&vars.stages[1], "points = 20;", &ctx));
    assert!(passes(&vars.stages[2], "cout << hp;", &ctx));

    let input = &lessons[2];
    assert!(passes(&input.stages[1], "cin >> width;\ncin >> height;", &none));

    let conditionals = &lessons[3];
    assert!(passes(&conditionals.stages[0], "if (health == 0) { cout << \"Game Over\"; }", &none));
    assert!(passes(&conditionals.stages[1], "if (coins > 10) cout << \"Rich\"; else cout << \"Poor\";", &none));
    assert!(passes(&conditionals.stages[2], "if (key && level > 5) { cout << \"Enter\"; }", &none));
    assert!(!passes(&conditionals.stages[2], "if (key || level > 5) { cout << \"Enter\"; }", &none));

    let loops = &lessons[4];
    assert!(passes(&loops.stages[0], "for (int k = 0; k < 10; k++) { cout << k; }", &none));
    assert!(!passes(&loops.stages[0], "for (int i = 0; i < 10; j++) { cout << i; }", &none));
    assert!(passes(&loops.stages[1], "sum += i;", &none));
    assert!(passes(&loops.stages[2], "cout << fuel;\n fuel--;", &none));
    assert!(!passes(&loops.stages[2], "cout << \"fuel\"; fuel--;", &none));

    let pointers = &lessons[5];
    assert!(passes(&pointers.stages[0], "std::cout << & score;", &none));
    assert!(passes(&pointers.stages[1], "int *p = &score;", &none));
    assert!(passes(&pointers.stages[2], "*p = 50;", &none));
  }

  // Finishing the built-in course in order reports each module once.
  #[test]
  fn built_in_course_completes_every_module() {
    let lessons: Vec<Arc<Lesson>> = seed_lessons().into_iter().map(Arc::new).collect();
    let store = MemoryStore::new();
    let mut progress = CourseProgress::load(&store, lessons.len());

    let mut skills = Vec::new();
    let mut finished = false;
    for index in 0..lessons.len() {
      let outcome = progress.complete(index, &lessons, &store);
      if let Some(done) = outcome.module_completed {
        skills.push((index, done.module, done.skill));
      }
      finished = outcome.course_completed;
    }

    assert_eq!(
      skills,
      vec![
        (4, "PG1".to_string(), "C++ Fundamentals".to_string()),
        (5, "PG2".to_string(), "Control Flow Mastery".to_string()),
      ]
    );
    assert!(finished);
    assert_eq!(progress.unlocked_lesson, lessons.len() - 1);
  }
}
