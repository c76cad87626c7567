//! Document transformer implementation.
//!
//! Maps extracted aggregates onto the documents stored in the search indices.

use catalog_etl_shared::{
    Aggregate, FilmAggregate, GenreAggregate, GenreDocument, MovieDocument, NamedRef,
    PersonAggregate, PersonCredit, PersonDocument, PersonRole, SearchDocument,
};

/// Stateless aggregate-to-document mapping.
///
/// Output depends only on the input aggregate, so transforming the same
/// aggregate twice yields identical documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTransformer;

impl DocumentTransformer {
    /// Create a new document transformer.
    pub fn new() -> Self {
        Self
    }

    /// Transform any aggregate into the document for its index.
    pub fn transform(&self, aggregate: &Aggregate) -> SearchDocument {
        match aggregate {
            Aggregate::Film(film) => SearchDocument::Movie(self.film(film)),
            Aggregate::Genre(genre) => SearchDocument::Genre(self.genre(genre)),
            Aggregate::Person(person) => SearchDocument::Person(self.person(person)),
        }
    }

    /// Project a film aggregate.
    ///
    /// Credits are split by role. A person credited with two roles appears in
    /// both projections; credits with any other role appear in none.
    pub fn film(&self, film: &FilmAggregate) -> MovieDocument {
        let actors = credits_with_role(&film.persons, PersonRole::Actor);
        let writers = credits_with_role(&film.persons, PersonRole::Writer);
        let directors = credits_with_role(&film.persons, PersonRole::Director);

        MovieDocument {
            id: film.id,
            imdb_rating: film.rating,
            genre: film.genres.iter().map(|g| g.name.clone()).collect(),
            title: film.title.clone(),
            description: film.description.clone(),
            director: names(&directors),
            actors_names: names(&actors),
            writers_names: names(&writers),
            actors,
            writers,
            directors,
            genres: film
                .genres
                .iter()
                .map(|g| NamedRef {
                    id: g.id,
                    name: g.name.clone(),
                })
                .collect(),
        }
    }

    pub fn genre(&self, genre: &GenreAggregate) -> GenreDocument {
        GenreDocument {
            id: genre.id,
            name: genre.name.clone(),
            description: genre.description.clone(),
        }
    }

    pub fn person(&self, person: &PersonAggregate) -> PersonDocument {
        PersonDocument {
            uuid: person.id,
            full_name: person.full_name.clone(),
            film_work_ids: person.film_ids.clone(),
        }
    }
}

fn credits_with_role(credits: &[PersonCredit], role: PersonRole) -> Vec<NamedRef> {
    credits
        .iter()
        .filter(|credit| credit.role == role)
        .map(|credit| NamedRef {
            id: credit.id,
            name: credit.name.clone(),
        })
        .collect()
}

fn names(refs: &[NamedRef]) -> Vec<String> {
    refs.iter().map(|r| r.name.clone()).collect()
}
